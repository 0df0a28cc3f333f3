use super::function::{ArgDecl, ArgRank, ArgType, Function, Module, Returns};
use super::{float_to_int, ExitMode, Host, Ownership, Request, Scalar, Type, Val};
use crate::error;
use crate::lang::Error;
use rand::Rng;

type Result<T> = std::result::Result<T, Error>;

const ANY: ArgDecl = ArgDecl::value(ArgType::Any, ArgRank::Any);
const FLOAT: ArgDecl = ArgDecl::value(ArgType::Float, ArgRank::Scalar);
const INTEGER: ArgDecl = ArgDecl::value(ArgType::Integer, ArgRank::Scalar);
const NUMERIC: ArgDecl = ArgDecl::value(ArgType::Numeric, ArgRank::Scalar);
const TEXT: ArgDecl = ArgDecl::value(ArgType::Text, ArgRank::Scalar);

/// The `core` module: the commands and functions every session has.
pub fn core() -> Module {
    let mut m = Module::new("core");
    m.variables = vec![
        (
            "pi",
            Val::scalar(Scalar::Float(std::f64::consts::PI)).with_owner(Ownership::Parameter),
        ),
        (
            "verbose",
            Val::scalar(Scalar::Logical(false)).with_owner(Ownership::ReadWrite),
        ),
    ];
    m.functions = vec![
        Function::command("print", &[ANY], print)
            .arity(0, usize::MAX)
            .preferred()
            .help("print values separated by blanks"),
        Function::command("show", &[ArgDecl::literal()], show)
            .arity(0, 1)
            .help("list variables beginning with a prefix"),
        Function::command("delete", &[ArgDecl::name()], delete)
            .arity(1, usize::MAX)
            .help("delete variables"),
        Function::command(
            "swap",
            &[ArgDecl::reference(ArgType::Any, ArgRank::Any); 2],
            swap,
        )
        .help("exchange the contents of two variables"),
        Function::command("quit", &[INTEGER], quit)
            .arity(0, 1)
            .help("full clean up and exit"),
        Function::command("exit", &[INTEGER], exit)
            .arity(0, 1)
            .help("minimal clean up and exit"),
        Function::command("help", &[ArgDecl::literal()], help)
            .arity(0, 1)
            .preferred()
            .help("describe modules and functions"),
        Function::elemental("abs", &[NUMERIC], Returns::SameAs(0), abs),
        Function::elemental("sqrt", &[FLOAT], Returns::Fixed(Type::Float), sqrt),
        Function::elemental("sin", &[FLOAT], Returns::Fixed(Type::Float), sin),
        Function::elemental("cos", &[FLOAT], Returns::Fixed(Type::Float), cos),
        Function::elemental("tan", &[FLOAT], Returns::Fixed(Type::Float), tan),
        Function::elemental("exp", &[FLOAT], Returns::Fixed(Type::Float), exp),
        Function::elemental("log", &[FLOAT], Returns::Fixed(Type::Float), log),
        Function::elemental("log10", &[FLOAT], Returns::Fixed(Type::Float), log10),
        Function::elemental("int", &[NUMERIC], Returns::Fixed(Type::Integer), int),
        Function::elemental("nint", &[NUMERIC], Returns::Fixed(Type::Integer), nint),
        Function::elemental("float", &[NUMERIC], Returns::Fixed(Type::Float), float),
        Function::elemental("len", &[TEXT], Returns::Fixed(Type::Integer), len),
        Function::elemental("rand", &[], Returns::Fixed(Type::Float), rand),
        Function::once(
            "size",
            &[ArgDecl::reference(ArgType::Any, ArgRank::Any), INTEGER],
            Returns::Fixed(Type::Integer),
            size,
        )
        .arity(1, 2)
        .help("element count, or the extent along one axis"),
        Function::once(
            "sum",
            &[ArgDecl::reference(ArgType::Numeric, ArgRank::Any)],
            Returns::SameAs(0),
            sum,
        ),
        Function::once(
            "minval",
            &[ArgDecl::reference(ArgType::Numeric, ArgRank::Any)],
            Returns::SameAs(0),
            minval,
        ),
        Function::once(
            "maxval",
            &[ArgDecl::reference(ArgType::Numeric, ArgRank::Any)],
            Returns::SameAs(0),
            maxval,
        ),
        Function::once("ramp", &[INTEGER], Returns::Fixed(Type::Integer), ramp)
            .returning_rank(ArgRank::One)
            .help("the integers 1 to n"),
        Function::once("date", &[], Returns::Fixed(Type::Text), date),
    ];
    m
}

fn arg(args: &[Val], index: usize) -> Result<&Val> {
    args.get(index)
        .ok_or_else(|| error!(WrongArgumentCount; format!("ARGUMENT {} MISSING", index + 1)))
}

fn output(out: Option<&mut Val>) -> Result<&mut Val> {
    out.ok_or_else(|| error!(InternalError; "NO OUTPUT CELL"))
}

fn set(out: Option<&mut Val>, value: Scalar) -> Result<()> {
    *output(out)? = Val::scalar(value).with_owner(Ownership::FunctionValue);
    Ok(())
}

fn float_fn(args: &[Val], out: Option<&mut Val>, f: impl Fn(f64) -> Result<f64>) -> Result<()> {
    let x = f64::try_from(arg(args, 0)?)?;
    let y = f(x)?;
    if !y.is_finite() {
        return Err(error!(Overflow));
    }
    set(out, Scalar::Float(y))
}

fn print(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    host.print(&parts.join(" "));
    host.print("\n");
    Ok(())
}

fn literal(args: &[Val]) -> Result<String> {
    match args.first() {
        Some(v) => Ok(v.text()?.to_string()),
        None => Ok(String::new()),
    }
}

fn show(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    host.request(Request::Show(literal(args)?));
    Ok(())
}

fn help(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    host.request(Request::Help(literal(args)?));
    Ok(())
}

fn delete(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    for name in args.iter() {
        host.request(Request::Delete(name.text()?.to_string()));
    }
    Ok(())
}

fn swap(_: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    if args.len() != 2 {
        return Err(error!(WrongArgumentCount));
    }
    if args[0].ty() != args[1].ty() {
        return Err(error!(TypeMismatch; format!("{} AND {}", args[0].ty(), args[1].ty())));
    }
    args.swap(0, 1);
    Ok(())
}

fn exit_code(args: &[Val]) -> Result<i32> {
    match args.first() {
        Some(v) => match i32::try_from(i64::try_from(v)?) {
            Ok(code) => Ok(code),
            Err(_) => Err(error!(Overflow; "EXIT CODE")),
        },
        None => Ok(0),
    }
}

fn quit(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    host.request(Request::Exit(ExitMode::Full(exit_code(args)?)));
    Ok(())
}

fn exit(host: &mut Host, args: &mut [Val], _: Option<&mut Val>) -> Result<()> {
    host.request(Request::Exit(ExitMode::Minimal(exit_code(args)?)));
    Ok(())
}

fn abs(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    match arg(args, 0)?.first()? {
        Scalar::Integer(n) => match n.checked_abs() {
            Some(n) => set(out, Scalar::Integer(n)),
            None => Err(error!(Overflow)),
        },
        Scalar::Float(n) => set(out, Scalar::Float(n.abs())),
        _ => Err(error!(TypeMismatch)),
    }
}

fn sqrt(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| {
        if x < 0.0 {
            Err(error!(DomainError; "SQRT OF NEGATIVE NUMBER"))
        } else {
            Ok(x.sqrt())
        }
    })
}

fn sin(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| Ok(x.sin()))
}

fn cos(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| Ok(x.cos()))
}

fn tan(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| Ok(x.tan()))
}

fn exp(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| Ok(x.exp()))
}

fn log(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| {
        if x <= 0.0 {
            Err(error!(DomainError; "LOG OF NON POSITIVE NUMBER"))
        } else {
            Ok(x.ln())
        }
    })
}

fn log10(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    float_fn(args, out, |x| {
        if x <= 0.0 {
            Err(error!(DomainError; "LOG OF NON POSITIVE NUMBER"))
        } else {
            Ok(x.log10())
        }
    })
}

fn int(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let n = i64::try_from(arg(args, 0)?)?;
    set(out, Scalar::Integer(n))
}

fn nint(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let n = match arg(args, 0)?.first()? {
        Scalar::Integer(n) => n,
        other => float_to_int(other.as_f64()?.round())?,
    };
    set(out, Scalar::Integer(n))
}

fn float(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let x = f64::try_from(arg(args, 0)?)?;
    set(out, Scalar::Float(x))
}

fn len(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let n = arg(args, 0)?.text()?.chars().count();
    set(out, Scalar::Integer(n as i64))
}

fn rand(host: &mut Host, _: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let x: f64 = host.rng().gen();
    set(out, Scalar::Float(x))
}

fn size(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let a = arg(args, 0)?;
    let n = match args.get(1) {
        Some(axis) => {
            let axis = i64::try_from(axis)?;
            if !(1..=3).contains(&axis) {
                return Err(error!(DomainError; format!("AXIS {}", axis)));
            }
            a.shape().extent(axis as usize - 1)
        }
        None => a.len(),
    };
    set(out, Scalar::Integer(n as i64))
}

fn sum(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let a = arg(args, 0)?;
    if let Some(v) = a.as_integers() {
        let mut total: i64 = 0;
        for n in v {
            total = match total.checked_add(*n) {
                Some(t) => t,
                None => return Err(error!(Overflow)),
            };
        }
        return set(out, Scalar::Integer(total));
    }
    match a.as_floats() {
        Some(v) => set(out, Scalar::Float(v.iter().sum())),
        None => Err(error!(TypeMismatch; "NUMERIC ARRAY EXPECTED")),
    }
}

fn extreme(args: &[Val], out: Option<&mut Val>, keep: std::cmp::Ordering) -> Result<()> {
    let a = arg(args, 0)?;
    if a.is_empty() {
        return Err(error!(DomainError; "EMPTY ARRAY"));
    }
    if let Some(v) = a.as_integers() {
        let mut best = v[0];
        for n in &v[1..] {
            if n.cmp(&best) == keep {
                best = *n;
            }
        }
        return set(out, Scalar::Integer(best));
    }
    match a.as_floats() {
        Some(v) => {
            let mut best = v[0];
            for n in &v[1..] {
                if n.partial_cmp(&best) == Some(keep) {
                    best = *n;
                }
            }
            set(out, Scalar::Float(best))
        }
        None => Err(error!(TypeMismatch; "NUMERIC ARRAY EXPECTED")),
    }
}

fn minval(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    extreme(args, out, std::cmp::Ordering::Less)
}

fn maxval(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    extreme(args, out, std::cmp::Ordering::Greater)
}

fn ramp(_: &mut Host, args: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let n = i64::try_from(arg(args, 0)?)?;
    if n < 0 {
        return Err(error!(DomainError; "NEGATIVE LENGTH"));
    }
    *output(out)? = Val::integers((1..=n).collect()).with_owner(Ownership::FunctionValue);
    Ok(())
}

fn date(_: &mut Host, _: &mut [Val], out: Option<&mut Val>) -> Result<()> {
    let now = chrono::Local::now();
    set(out, Scalar::Text(now.format("%Y-%m-%d %H:%M:%S").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::Shape;

    fn call(name: &str, mut args: Vec<Val>) -> Result<Val> {
        let m = core();
        let f = m.functions.iter().find(|f| f.name == name).unwrap();
        let mut host = Host::new();
        let mut out = Val::new(Type::Float, Shape::SCALAR, Ownership::Temporary);
        (f.native)(&mut host, &mut args, Some(&mut out))?;
        Ok(out)
    }

    fn scalar(s: Scalar) -> Val {
        Val::scalar(s)
    }

    #[test]
    fn test_elemental_math() {
        let v = call("sqrt", vec![scalar(Scalar::Float(16.0))]).unwrap();
        assert_eq!(v.first().unwrap(), Scalar::Float(4.0));
        let e = call("sqrt", vec![scalar(Scalar::Float(-1.0))]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::DomainError);
        let v = call("abs", vec![scalar(Scalar::Integer(-3))]).unwrap();
        assert_eq!(v.first().unwrap(), Scalar::Integer(3));
        let v = call("nint", vec![scalar(Scalar::Float(2.5))]).unwrap();
        assert_eq!(v.first().unwrap(), Scalar::Integer(3));
        let v = call("len", vec![scalar(Scalar::Text("héllo".into()))]).unwrap();
        assert_eq!(v.first().unwrap(), Scalar::Integer(5));
    }

    #[test]
    fn test_reductions() {
        let a = Val::integers(vec![3, 9, -2]);
        assert_eq!(call("sum", vec![a.clone()]).unwrap().first().unwrap(), Scalar::Integer(10));
        assert_eq!(call("minval", vec![a.clone()]).unwrap().first().unwrap(), Scalar::Integer(-2));
        assert_eq!(call("maxval", vec![a]).unwrap().first().unwrap(), Scalar::Integer(9));
        let e = call("maxval", vec![Val::floats(vec![])]).unwrap_err();
        assert_eq!(e.code(), ErrorCode::DomainError);
        let r = call("ramp", vec![scalar(Scalar::Integer(4))]).unwrap();
        assert_eq!(r.as_integers().unwrap(), [1, 2, 3, 4]);
        let m = Val::new(Type::Float, Shape::new(&[2, 5]).unwrap(), Ownership::Temporary);
        let n = call("size", vec![m.clone(), scalar(Scalar::Integer(2))]).unwrap();
        assert_eq!(n.first().unwrap(), Scalar::Integer(5));
        assert_eq!(call("size", vec![m]).unwrap().first().unwrap(), Scalar::Integer(10));
    }

    #[test]
    fn test_swap_requires_same_type() {
        let m = core();
        let f = m.functions.iter().find(|f| f.name == "swap").unwrap();
        let mut host = Host::new();
        let mut args = vec![Val::integers(vec![1]), Val::integers(vec![2, 3])];
        (f.native)(&mut host, &mut args, None).unwrap();
        assert_eq!(args[0].len(), 2);
        let mut args = vec![Val::integers(vec![1]), Val::floats(vec![2.0])];
        assert!((f.native)(&mut host, &mut args, None).is_err());
    }
}

use rand::rngs::StdRng;
use rand::SeedableRng;

/// How the interpreter leaves. Both run the module teardowns in reverse
/// registration order; a full exit also releases variables and macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    Full(i32),
    Minimal(i32),
}

impl ExitMode {
    pub fn code(self) -> i32 {
        match self {
            ExitMode::Full(code) | ExitMode::Minimal(code) => code,
        }
    }
}

/// Work a native function asks of the interpreter, carried out as soon as
/// the function returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Delete(String),
    Show(String),
    Help(String),
    Exit(ExitMode),
}

/// ## Services available to native functions
///
/// Natives never see the console. Text they print is buffered here and
/// handed to the console when the statement finishes.
#[derive(Debug)]
pub struct Host {
    output: String,
    requests: Vec<Request>,
    rng: StdRng,
}

impl Default for Host {
    fn default() -> Host {
        Host {
            output: String::new(),
            requests: vec![],
            rng: StdRng::from_entropy(),
        }
    }
}

impl Host {
    pub fn new() -> Host {
        Host::default()
    }

    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

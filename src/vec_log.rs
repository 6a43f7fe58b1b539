use crate::interpreter::Log;

/// Keeps every line sent to it, for callers that inspect the trace afterwards.
#[derive(Debug, Default)]
pub struct VecLog {
    pub lines: Vec<String>,
}

impl Log for VecLog {
    fn log(&mut self, msg: String) {
        self.lines.push(msg);
    }
}

use std::io::{self, BufRead, Write};

/// Source of operator answers for the interactive prompts.
pub trait InputProvider {
    /// Show `prompt` and return the operator's reply without the line ending.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask a y/n question; only `y` or `Y` is yes.
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.ask(prompt)?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    /// Block until the operator presses Enter.
    fn wait(&mut self, prompt: &str) -> io::Result<()> {
        self.ask(prompt).map(|_| ())
    }
}

/// Prompts on stdout, reads replies from stdin.
pub struct ConsoleInput;

impl InputProvider for ConsoleInput {
    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

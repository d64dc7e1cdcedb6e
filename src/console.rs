//! The interactive prompt on stdin.

use std::io::{self, BufRead, Write};

use crate::Server;

const HELP: &str = "\
Commands:
  help      show this text
  status    show the listener state and address
  browse    show the address of the home page
  shutdown  stop the server";


#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Shutdown,
    InputClosed,
}

pub fn run<R: BufRead, W: Write>(mut input: R, mut output: W, server: &Server) -> io::Result<Outcome> {
    writeln!(output, "Server started for port {}.", server.port())?;
    writeln!(output, "Type 'browse' for the home page address, 'help' for all commands.")?;

    loop {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Outcome::InputClosed);
        }

        match line.trim().to_lowercase().as_str() {
            "" => {}
            "help" => writeln!(output, "{}", HELP)?,
            "status" => {
                match server.local_addr() {
                    Some(addr) => writeln!(output, "Listener {:?} on {}", server.state(), addr)?,
                    None => writeln!(output, "Listener {:?}", server.state())?,
                }
            }
            "browse" => writeln!(output, "Open http://localhost:{}/ in your browser.", server.port())?,
            "shutdown" => {
                writeln!(output, "Shutting down.")?;
                return Ok(Outcome::Shutdown);
            }
            other => writeln!(output, "Huh? Unknown command {:?}; try 'help'.", other)?,
        }
    }
}

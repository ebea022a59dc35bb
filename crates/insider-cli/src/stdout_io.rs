use std::io::{self, Write};

/// Writes to stdout, treating a closed pipe (`insider ... | head`) as success.
pub fn write_stdout_text(text: &str) -> io::Result<()> {
    write_tolerating_closed_pipe(&mut io::stdout().lock(), text, false)
}

pub fn write_stdout_line(text: &str) -> io::Result<()> {
    write_tolerating_closed_pipe(&mut io::stdout().lock(), text, true)
}

fn write_tolerating_closed_pipe(
    writer: &mut dyn Write,
    text: &str,
    newline: bool,
) -> io::Result<()> {
    let mut write = || -> io::Result<()> {
        writer.write_all(text.as_bytes())?;
        if newline {
            writer.write_all(b"\n")?;
        }
        writer.flush()
    };
    match write() {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

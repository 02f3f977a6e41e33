use std::fs::OpenOptions;

use ca64_link::{Command, CommandWriter};

use crate::cmd::SendArgs;
use crate::exit::{io_error, link_error, CliResult, SUCCESS};
use crate::output::{print_summary, OutputFormat, SentOutput};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    // Reject the whole batch before anything reaches the device.
    let commands = parse_commands(&args.commands)?;

    let port = OpenOptions::new()
        .write(true)
        .open(&args.path)
        .map_err(|err| io_error(&format!("failed opening {}", args.path.display()), err))?;
    CommandWriter::new(port)
        .send_all(&commands)
        .map_err(|err| link_error("send failed", err))?;

    let sent: Vec<String> = commands.iter().map(ToString::to_string).collect();
    print_summary(
        &SentOutput {
            path: args.path.display().to_string(),
            commands: &sent,
        },
        &sent.join("\n"),
        format,
    );
    Ok(SUCCESS)
}

fn parse_commands(inputs: &[String]) -> CliResult<Vec<Command>> {
    inputs
        .iter()
        .map(|input| {
            input
                .parse::<Command>()
                .map_err(|err| link_error(&format!("rejected {input:?}"), err))
        })
        .collect()
}

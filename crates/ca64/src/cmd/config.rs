use ca64_link::DeviceConfig;

use crate::cmd::ConfigArgs;
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_config, OutputFormat};

pub fn run(args: ConfigArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.file {
        Some(path) => DeviceConfig::load(path)
            .map_err(|err| link_error(&format!("failed loading {}", path.display()), err))?,
        None => DeviceConfig::default(),
    };
    let commands = config
        .commands()
        .map_err(|err| link_error("invalid device config", err))?;

    print_config(&config, &commands, format);
    Ok(SUCCESS)
}

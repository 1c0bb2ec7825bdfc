use std::path::Path;

use blendbridge::{BlendReader, InterchangeFormat, OnceNotifier, SourceMap};
use blendbridge_error::{BridgeError, Result};

use crate::util::{self, ConsoleNotifier, DefaultVolume, FileImporter};

pub fn cmd_read(
    settings: &Path,
    tool: Option<&Path>,
    file: &Path,
    format: Option<&str>,
) -> Result<()> {
    let mut config = util::load_config(settings, tool)?;
    if let Some(format) = format {
        config.interchange = InterchangeFormat::from_extension(format)
            .ok_or_else(|| BridgeError::config_unsupported_extension(format))?;
    }
    let runner = util::verified_runner(&mut config)?;

    let importer = FileImporter;
    let notifier = OnceNotifier::new(ConsoleNotifier);
    let volume = DefaultVolume;
    let reader = BlendReader::new(&config, &runner, &importer, &notifier, &volume);

    let mut map = SourceMap::new();
    let outcome = reader.read_reported(file, &mut map, &[])?;
    for node in &outcome.nodes {
        let reference = map.resolve(node.id(), file);
        match reference.split_index {
            Some(index) => println!(
                "object {} of {}",
                index + 1,
                reference.original_path.display()
            ),
            None => println!("{}", reference.original_path.display()),
        }
    }
    if let Some(scale) = outcome.scale {
        if !scale.is_noop() {
            println!("scaled by {:.4}", scale.factor);
        }
    }
    Ok(())
}

//! Interactive mode, used when no subcommand is given.

use cliclack::{intro, log, outro};

use crate::config::LoadedConfig;
use crate::error::{CheckError, CheckResult};
use crate::prompt::{
    Mode, init_theme, prompt_export, prompt_mode, prompt_pack_target, prompt_threads,
};

use super::check::export_lists;
use super::common::{analyse, open_manifest, print_summary, resolve_input};
use super::pack_cmd::write_packs;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Menu loop: pick a mode, run it, come back until the user exits.
pub async fn run_interactive(loaded: &LoadedConfig) -> CheckResult<()> {
    init_theme();
    intro("Mod Side Checker")?;

    loop {
        let mode = prompt_mode()?;
        let result = match mode {
            Mode::Check => check_mode(loaded).await,
            Mode::Pack => pack_mode(loaded).await,
            Mode::Exit => break,
        };

        match result {
            Ok(()) => {}
            Err(CheckError::Cancelled) => return Err(CheckError::Cancelled),
            Err(e) => {
                log::error(&e)?;
                if let CheckError::InputNotFound(path) = &e {
                    log::info(format!(
                        "Put modrinth.index.json or a .mrpack file in {}",
                        path.display()
                    ))?;
                }
            }
        }
    }

    outro("Bye!")?;
    Ok(())
}

async fn check_mode(loaded: &LoadedConfig) -> CheckResult<()> {
    let config = &loaded.config;
    let threads = prompt_threads(&config.threading)?;
    let input = resolve_input(config, None)?;
    let manifest = open_manifest(&input)?;

    let outcome = analyse(&manifest, config, threads).await?;
    print_summary(&outcome);

    while let Some(selection) = prompt_export()? {
        export_lists(
            &outcome.results,
            selection,
            config.export.format,
            &config.folders.output,
        );
    }
    Ok(())
}

async fn pack_mode(loaded: &LoadedConfig) -> CheckResult<()> {
    let config = &loaded.config;
    let target = prompt_pack_target()?;
    let threads = prompt_threads(&config.threading)?;
    let input = resolve_input(config, None)?;
    let manifest = open_manifest(&input)?;

    let outcome = analyse(&manifest, config, threads).await?;
    print_summary(&outcome);

    write_packs(&manifest, &outcome.results, target, config, None);
    Ok(())
}

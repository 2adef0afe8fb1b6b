use crate::cli::args::ValidateArgs;
use crate::exit_codes;
use promptgrid_core::config::{AppConfig, ProviderKind};
use promptgrid_core::sources::{DirectorySource, ExperimentSource};
use promptgrid_core::CompletionClient;

/// Checks everything `run` needs without calling a model.
pub fn cmd_validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let mut problems = 0usize;

    match AppConfig::load(&args.input.config) {
        Ok(cfg) => {
            println!(
                "✓ config {} ({} models)",
                args.input.config.display(),
                cfg.models.len()
            );
            for model in &cfg.models {
                if model.provider_kind() == ProviderKind::Fake
                    || model.resolve_api_key().is_some()
                {
                    println!("  ✓ {}", model.name);
                } else {
                    println!(
                        "  ✗ {}: no API key (set api_key or one of {})",
                        model.name,
                        model.key_env_vars().join(", ")
                    );
                    problems += 1;
                }
            }
            if problems == 0 {
                if let Err(e) = CompletionClient::from_config(&cfg) {
                    println!("✗ {e}");
                    problems += 1;
                }
            }
        }
        Err(e) => {
            println!("✗ {e}");
            problems += 1;
        }
    }

    match DirectorySource::open(&args.input.prompts_dir, &args.input.test_cases_dir) {
        Ok(source) => {
            println!("✓ {} prompts", source.prompt_ids()?.len());
            println!("✓ {} test cases", source.test_case_ids()?.len());
        }
        Err(e) => {
            println!("✗ {e}");
            problems += 1;
        }
    }

    if problems == 0 {
        println!("Setup is valid.");
        Ok(exit_codes::SUCCESS)
    } else {
        println!("{problems} problem(s) found.");
        Ok(exit_codes::CONFIG_ERROR)
    }
}

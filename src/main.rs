use clap::Parser;
use color_eyre::Result;
use sheetplot::logging::{self, LogTarget};
use sheetplot::{AppConfig, Args, CacheManager, ConfigManager, SessionOptions, APP_NAME};

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration file written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing configuration: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let mut config = AppConfig::load(APP_NAME)?;
    if args.debug {
        config.debug.enabled = true;
    }
    let options = SessionOptions::from_args_and_config(&args, &config)?;

    let target = if args.headless {
        LogTarget::Stderr
    } else {
        LogTarget::CacheFile
    };
    if let Ok(cache) = CacheManager::new(APP_NAME) {
        if let Err(e) = logging::init(target, &config.logging.level, config.debug.enabled, &cache)
        {
            eprintln!("Warning: {}", e);
        }
    }

    if args.headless {
        let Some(path) = args.path.as_deref() else {
            return Err(color_eyre::eyre::eyre!("--headless requires a file path"));
        };
        if let Err(e) = sheetplot::run_headless(path, &options, args.axis.as_deref(), &args.series)
        {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Err(e) = sheetplot::run(args.path.clone(), options, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

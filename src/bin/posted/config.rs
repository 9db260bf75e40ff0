use std::env;
use std::io;
use std::path::{Path, PathBuf};

use posted::config::{read_config, Config};

use crate::config_data::write_sample_cfg;
use crate::CFG_FILE_NAME;

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("posted").join(CFG_FILE_NAME))
}

fn get_config_path() -> Option<PathBuf> {
    let exe_dir = env::current_exe().ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let cur_dir = env::current_dir().ok();

    [
        exe_dir.map(|dir| dir.join(CFG_FILE_NAME)),
        cur_dir.map(|dir| dir.join(CFG_FILE_NAME)),
        user_config_path(),
    ]
        .into_iter()
        .flatten()
        .find(|path| path.exists())
}

pub(crate) fn open_config(cfg_path: Option<PathBuf>) -> Result<Config, String> {
    let config_path = match cfg_path.or_else(get_config_path) {
        None => return Err("Could not find posted configuration".to_string()),
        Some(x) => x,
    };

    println!("Reading config from {}", config_path.display());
    let mut config = match read_config(&config_path) {
        Ok(config) => config,
        Err(e) => return Err(e.to_string()),
    };

    if let Some(mut log) = config.log {
        if log.location.is_none() {
            log.location = dirs::cache_dir().map(|dir| dir.join("posted").join("log").join("server.log"));
        }
        match log.location {
            Some(ref location) => println!("Log enabled. Files will be written in {}", location.display()),
            None => println!("Log enabled. Using console only"),
        }
        config.log = Some(log);
    } else {
        println!("Log disabled. Using stdout");
    }

    Ok(config)
}

pub(crate) fn generate_cfg(config_path: &Option<PathBuf>) -> io::Result<PathBuf> {
    let path = match config_path.clone().or_else(user_config_path) {
        Some(path) => path,
        None => return Err(io::Error::new(io::ErrorKind::NotFound, "Could not find user config dir")),
    };

    println!("Writing sample config to {}", path.display());
    write_sample_cfg(&path)?;

    Ok(path)
}

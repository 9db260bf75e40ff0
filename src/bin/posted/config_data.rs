use std::fs;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;

const CONFIG_SAMPLE: &str = r#"# For the file locations, If you want it to be relative to the executable directory
# use ${exe_dir}/location
[paths]
posts_dir = "posts"

[server]
address = "0.0.0.0"
port = 5000
# Largest accepted request body, in bytes
max_payload_size = 1048576

[store]
# Fail instead of falling back to content when a {...} first line is not valid metadata
strict_metadata = false

[render]
code_friendly = true
math = true
allow_html = false

[log]
level = "Info"
log_to_console = true
"#;

pub(crate) fn write_sample_cfg(file_path: &Path) -> io::Result<()> {
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(file_path)?;
    file.write_all(CONFIG_SAMPLE.as_bytes())
}

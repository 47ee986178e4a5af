use seqlink_engine::DEFAULT_REQUEST_TIMEOUT;
use seqlink_frame::{DEFAULT_MAX_FRAME, MAX_BODY_LEN};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("seqlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: seqlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SEQLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("max_body_len: {MAX_BODY_LEN}");
    println!("max_frame_size: {DEFAULT_MAX_FRAME}");
    println!(
        "default_request_timeout_ms: {}",
        DEFAULT_REQUEST_TIMEOUT.as_millis()
    );

    Ok(SUCCESS)
}

use super::{checksums, colorize_report, endpoints, exit_code, json_pretty, RunOptions};
use chrono::Local;
use mirrorcheck_core::SyncTarget;

/// Endpoint polling followed by checksum comparison, one mail per phase.
pub fn run(opts: &RunOptions, cloud_ip: &str, ancor_ip: &str) -> Result<u8, String> {
    let config = opts.load_sync_config()?;
    let target = SyncTarget::new(cloud_ip, ancor_ip);

    let api = endpoints::execute(opts, &config, &target)?;
    opts.send(
        config.email.as_ref(),
        &api.email(&Local::now()),
        !api.is_success(),
    );
    let sums = checksums::execute(opts, &config, &target)?;
    opts.send(
        config.email.as_ref(),
        &sums.email(&Local::now()),
        !sums.is_success(),
    );

    if opts.json {
        let combined = serde_json::json!({
            "endpoints": api,
            "checksums": sums,
        });
        println!("{}", json_pretty(&combined)?);
    } else {
        print!("{}", colorize_report(&api.render()));
        println!();
        print!("{}", colorize_report(&sums.render()));
    }
    Ok(exit_code(api.is_success() && sums.is_success()))
}

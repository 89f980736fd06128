use super::{colorize_report, exit_code, finish, json_pretty, open_sink, RunOptions};
use chrono::Local;
use mirrorcheck_core::{run_checksums, ChecksumRunReport, SyncConfig, SyncTarget};

pub fn execute(
    opts: &RunOptions,
    config: &SyncConfig,
    target: &SyncTarget,
) -> Result<ChecksumRunReport, String> {
    let sink = open_sink(&config.log_path)?;
    let pb = opts.spinner(&format!(
        "comparing {} folders between {} and {}",
        config.folders_shasum.len(),
        target.ancor_ip,
        target.cloud_ip
    ));
    let report = run_checksums(config, target, &sink);
    finish(
        pb.as_ref(),
        report.is_success(),
        &format!(
            "{} of {} folders match",
            report.matched().count(),
            report.results.len()
        ),
    );
    Ok(report)
}

pub fn run(opts: &RunOptions, cloud_ip: &str, ancor_ip: &str) -> Result<u8, String> {
    let config = opts.load_sync_config()?;
    let target = SyncTarget::new(cloud_ip, ancor_ip);
    let report = execute(opts, &config, &target)?;

    if opts.json {
        println!("{}", json_pretty(&report)?);
    } else {
        print!("{}", colorize_report(&report.render()));
    }
    opts.send(
        config.email.as_ref(),
        &report.email(&Local::now()),
        !report.is_success(),
    );
    Ok(exit_code(report.is_success()))
}

//! CLI command implementations.

pub mod config;
pub mod servers;
pub mod usage;
pub mod watch;

use usagewatch_fetch::SshOptions;
use usagewatch_monitor::MonitorSettings;
use usagewatch_store::GeneralConfig;

/// Builds fetch settings from the general section of the inventory.
pub fn monitor_settings(general: &GeneralConfig) -> MonitorSettings {
    let timeouts = &general.timeouts;
    MonitorSettings {
        ssh: SshOptions::with_connect_timeout(std::time::Duration::from_secs(
            general.connect_timeout,
        )),
        ready_timeout: timeouts.ready(),
        data_timeout: timeouts.data(),
        direct_timeout: timeouts.direct(),
        teardown_timeout: timeouts.teardown(),
        poll_interval: timeouts.poll_interval(),
        target_ready_signals: general.target_ready_signals,
        remote_log_path: general.remote_log_path.clone(),
        tail_lines: general.tail_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_monitor_settings_follow_general_config() {
        let mut general = GeneralConfig::default();
        general.connect_timeout = 4;
        general.timeouts.data = 90;
        general.target_ready_signals = 1;
        general.remote_log_path = "/var/log/usage.csv".into();

        let settings = monitor_settings(&general);

        assert_eq!(settings.ssh.connect_timeout, Some(Duration::from_secs(4)));
        assert_eq!(settings.data_timeout, Duration::from_secs(90));
        assert_eq!(settings.ready_timeout, Duration::from_secs(30));
        assert_eq!(settings.target_ready_signals, 1);
        assert_eq!(
            settings.remote_command(),
            "tail -2 /var/log/usage.csv 2>/dev/null"
        );
    }

    #[test]
    fn test_default_general_matches_monitor_defaults() {
        let settings = monitor_settings(&GeneralConfig::default());
        let defaults = MonitorSettings::default();

        assert_eq!(settings.ssh.connect_timeout, defaults.ssh.connect_timeout);
        assert_eq!(settings.direct_timeout, defaults.direct_timeout);
        assert_eq!(settings.teardown_timeout, defaults.teardown_timeout);
        assert_eq!(settings.poll_interval, defaults.poll_interval);
        assert_eq!(settings.remote_command(), defaults.remote_command());
    }
}

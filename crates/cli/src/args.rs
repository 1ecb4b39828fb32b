use std::path::PathBuf;

use clap::Parser;

/// Watch GPU free memory and push a notification when devices free up.
#[derive(Debug, Parser)]
#[command(name = "gpudog", version)]
pub struct Cli {
    /// Free CUDA memory required on each device, in MB.
    #[arg(short = 'm', long, default_value_t = 5000.0)]
    pub cuda_memory: f64,

    /// GPU indices to watch.
    #[arg(
        short = 'd',
        long,
        num_args = 1..,
        value_delimiter = ',',
        default_values_t = [0u32, 1, 2, 3, 4, 5, 6, 7]
    )]
    pub device_list: Vec<u32>,

    /// Check frequency, e.g. `10m`, `1h-30m`, `2d 4h`.
    #[arg(short = 'f', long, default_value = "10m")]
    pub check_freq: String,

    /// Prompt for the app token and uid again and overwrite the user info file.
    #[arg(short = 'r', long)]
    pub reload: bool,

    /// Keep checking and pushing after the condition is first met.
    #[arg(short = 'c', long)]
    pub continuous: bool,

    /// Launch the process command on the matched devices.
    #[arg(long, alias = "flag")]
    pub flag_preempt: bool,

    /// Process command launched under torchrun when preempting.
    #[arg(short = 'p', long)]
    pub process_name: Option<String>,

    /// File holding the app token (line 1) and uid (line 2).
    #[arg(short = 'u', long, default_value = "user_info.txt")]
    pub user_info: PathBuf,

    /// Instance label shown in notifications.
    #[arg(short = 'n', long, default_value = "server0")]
    pub name_server: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["gpudog"]);
        assert_eq!(cli.cuda_memory, 5000.0);
        assert_eq!(cli.device_list, (0..8).collect::<Vec<u32>>());
        assert_eq!(cli.check_freq, "10m");
        assert_eq!(cli.user_info, PathBuf::from("user_info.txt"));
        assert_eq!(cli.name_server, "server0");
        assert!(!cli.reload && !cli.continuous && !cli.flag_preempt && !cli.log_json);
        assert!(cli.process_name.is_none());
    }

    #[test]
    fn device_list_accepts_spaces_and_commas() {
        let cli = Cli::parse_from(["gpudog", "-d", "1", "3", "-f", "30s"]);
        assert_eq!(cli.device_list, vec![1, 3]);

        let cli = Cli::parse_from(["gpudog", "--device-list", "0,2,5"]);
        assert_eq!(cli.device_list, vec![0, 2, 5]);
    }

    #[test]
    fn preempt_alias() {
        let cli = Cli::parse_from(["gpudog", "--flag", "-p", "train.py --epochs 3"]);
        assert!(cli.flag_preempt);
        assert_eq!(cli.process_name.as_deref(), Some("train.py --epochs 3"));
    }
}

use clap::Parser;

/// Caching, ranking proxy in front of the Saavn music API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, colored output
    Pretty,
    /// One JSON object per event
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tracing_flag() {
        let args = Args::try_parse_from(["musicbox", "--tracing", "json"]).unwrap();
        assert_eq!(args.tracing, TracingFormat::Json);
        assert!(Args::try_parse_from(["musicbox", "--tracing", "xml"]).is_err());
    }
}

use clap::Parser;
use eyre::{Context, Result};
use pipetrace::Collector;
use protocol::Message;
use std::cell::RefCell;
use std::rc::Rc;
use tracer::FileExporter;
use tracing::info;
use transport::PipeServer;

#[derive(Parser)]
#[command(name = "pipetrace")]
#[command(about = "collect trace events from a named pipe into chrome trace format")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "/tmp/tracer.pipe",
        help = "named pipe to read trace events from"
    )]
    pipe: String,

    #[arg(
        short,
        long,
        default_value = "trace.json",
        help = "output file for trace data"
    )]
    output: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!(pipe = %args.pipe, output = %args.output, "starting trace collector");

    let exporter = FileExporter::create(&args.output)
        .with_context(|| format!("failed to open output file path={}", args.output))?;
    let collector = Rc::new(RefCell::new(Collector::new(exporter)));

    let mut server = PipeServer::new(&args.pipe);
    server
        .init()
        .with_context(|| format!("failed to initialize server on pipe={}", args.pipe))?;

    let message_handler = {
        let collector = collector.clone();
        move |msg: &Message| collector.borrow_mut().handle_message(msg)
    };
    let stop_handler = {
        let collector = collector.clone();
        move || collector.borrow_mut().finish()
    };
    server.run(message_handler, stop_handler)?;

    info!(output = %args.output, "trace collection complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["pipetrace"]);
        assert_eq!(args.pipe, "/tmp/tracer.pipe");
        assert_eq!(args.output, "trace.json");
    }
}

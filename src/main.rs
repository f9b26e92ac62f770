use clap::Parser;

use ytgrab::{
    client::FormHandler,
    config::{Cli, Command, GetArgs},
    logging, server,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Command::Serve(args) => server::serve(args).await,
        Command::Get(args) => get(args).await,
    }
}

async fn get(args: GetArgs) -> anyhow::Result<()> {
    let mut handler = FormHandler::new(&args.server, args.out_dir.clone())?;

    handler.submit(&args.url).await;
    print!("{}", handler.page().render());
    if !handler.page().error.is_empty() {
        anyhow::bail!("{}", handler.page().error);
    }

    let Some(pick) = args.pick else {
        return Ok(());
    };
    if pick == 0 || pick > handler.page().formats.len() {
        anyhow::bail!("no format at position {pick}");
    }

    match handler.download(pick - 1).await {
        Some(path) => {
            println!("saved {}", path.display());
            Ok(())
        }
        None => anyhow::bail!("{}", handler.page().error),
    }
}

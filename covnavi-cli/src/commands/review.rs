use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Notify;

use covnavi_core::catalogue::Catalogue;
use covnavi_core::filter::ReviewFilter;
use covnavi_core::review::{CommandEditor, Decision, Editor, NullEditor, Operator, ReviewSession};

use super::Globals;

const PROMPT: &str = "[h]ighlight, [i]gnore, enter for next, Ctrl-C to save and quit > ";

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Catalogue produced by `covnavi build`
    #[arg(short = 'j', long = "json")]
    pub json: PathBuf,

    /// Root of the source tree the catalogue's filenames are relative to
    #[arg(short = 'c', long = "coderoot")]
    pub coderoot: PathBuf,

    /// Skip conditionals whose index is below this
    #[arg(short = 'i', long = "startidx", default_value_t = 0)]
    pub start_index: usize,

    /// Only show conditionals whose filename contains this
    #[arg(short = 'f', long = "filterfilename")]
    pub filter_filename: Option<String>,

    /// Interest threshold in [0, 1] (overrides `review.threshold`)
    #[arg(short = 't', long = "threshold")]
    pub threshold: Option<f64>,

    /// Only show highlighted conditionals
    #[arg(short = 'l', long = "highlighted")]
    pub highlighted: bool,

    /// Do not drive an external editor
    #[arg(long)]
    pub no_editor: bool,
}

/// Reads decisions from stdin; Ctrl-C at any point becomes an interrupt.
struct TerminalOperator {
    lines: Lines<BufReader<Stdin>>,
    interrupt: Arc<Notify>,
}

impl TerminalOperator {
    fn new() -> Self {
        let interrupt = Arc::new(Notify::new());
        let notify = Arc::clone(&interrupt);
        tokio::spawn(async move {
            // A permit is stored when nobody is waiting, so a signal between prompts is kept.
            while tokio::signal::ctrl_c().await.is_ok() {
                notify.notify_one();
            }
        });
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            interrupt,
        }
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn decide(&mut self, summary: &str) -> Decision {
        {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "{summary}{PROMPT}");
            let _ = stdout.flush();
        }

        tokio::select! {
            biased;
            () = self.interrupt.notified() => Decision::Interrupt,
            line = self.lines.next_line() => match line {
                Ok(Some(line)) => Decision::Input(line),
                Ok(None) => Decision::Interrupt,
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot read operator input");
                    Decision::Interrupt
                }
            },
        }
    }
}

pub async fn run(args: ReviewArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let threshold = args.threshold.unwrap_or(config.review.threshold);
    let filter = ReviewFilter::new(
        threshold,
        args.highlighted,
        args.filter_filename,
        args.start_index,
    )?;

    let catalogue = Catalogue::load(&args.json)
        .with_context(|| format!("Cannot load catalogue: {}", args.json.display()))?;
    if !globals.quiet {
        println!("Total conditionals: {}", catalogue.len());
    }

    let mut editor: Box<dyn Editor> = if args.no_editor || !config.editor.enabled {
        Box::new(NullEditor)
    } else {
        Box::new(CommandEditor::from_config(&config.editor))
    };
    let mut operator = TerminalOperator::new();

    let outcome = ReviewSession::new(
        catalogue,
        &args.json,
        &args.coderoot,
        filter,
        &mut operator,
        editor.as_mut(),
    )
    .run()
    .await
    .with_context(|| format!("Cannot save catalogue: {}", args.json.display()))?;

    if !globals.quiet {
        println!();
        println!(
            "Reviewed {} conditional(s), annotated {}{}",
            outcome.surfaced,
            outcome.annotated,
            if outcome.interrupted { " (interrupted)" } else { "" }
        );
        let stats = outcome.catalogue.stats();
        println!(
            "  Highlighted: {}  Ignored: {}  Total: {}",
            stats.highlighted, stats.ignored, stats.conditionals
        );
        if let Some(backup) = &outcome.save.backup {
            println!("  Backup: {}", backup.display());
        }
    }
    Ok(())
}

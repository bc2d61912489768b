mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use gradebox_common::assembler::ReportStyle;
use gradebox_common::grading::GradingStrategy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gradebox-cli")]
#[command(about = "Gradebox CLI - Assemble and grade submissions offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Markers,
    Lines,
}

impl From<Strategy> for GradingStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Markers => GradingStrategy::Markers,
            Strategy::Lines => GradingStrategy::Lines,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the program a submission assembles to
    Assemble {
        /// Submission JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// How test results are reported by the program
        #[arg(short, long, value_enum, default_value = "markers")]
        style: Strategy,

        /// Language table (languages.json); built-in table when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Grade captured program output against a submission's test cases
    Grade {
        /// Submission JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// File holding the program's combined output
        #[arg(short, long)]
        output: PathBuf,

        /// Grading strategy
        #[arg(short, long, value_enum, default_value = "markers")]
        strategy: Strategy,
    },

    /// List configured languages
    Languages {
        /// Language table (languages.json); built-in table when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble { file, style, config } => {
            let style: ReportStyle = GradingStrategy::from(style).report_style();
            let program = commands::assemble(&file, style, config.as_deref())?;
            print!("{}", program);
        }
        Commands::Grade {
            file,
            output,
            strategy,
        } => {
            let graded = commands::grade(&file, &output, strategy.into())?;
            println!("{}", graded);
        }
        Commands::Languages { config } => {
            print!("{}", commands::list_languages(config.as_deref())?);
        }
    }

    Ok(())
}

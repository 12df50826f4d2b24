use ragfold::corpus::{load_ignore_set, load_test_rows, MutationCorpus};
use ragfold::fold::CrossValidation;
use ragfold::normalizer::StdinArbiter;
use ragfold::rag::{ChatGenerator, EmbeddingIndexFactory, DEFAULT_TOP_K};
use ragfold::report::JsonArrayWriter;
use ragfold::runner::{Harness, Pipeline};

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dotenv::dotenv;
use std::env;
use std::fs::{self, File};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "RagFold")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cross-validated classification pass over a test file
    Run {
        /// Mutation corpus JSON (base prompts with their mutations)
        #[arg(short, long, default_value = "prompts_with_mutations.json")]
        mutations: PathBuf,

        /// Plain-text system prompt, used verbatim for every generation call
        #[arg(short, long, default_value = "prompt.md")]
        system_prompt: PathBuf,

        /// Test input file (.csv with a prompt column, or .json)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write per-item results
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Cross-validation scheme
        #[arg(long, value_enum, default_value_t = SchemeArg::SimpleFifths)]
        scheme: SchemeArg,

        /// Column/field holding the prompt text in structured test rows
        #[arg(long, default_value = "Prompts")]
        prompt_field: String,

        /// Base prompts to exclude from both training and testing, one per line
        #[arg(long)]
        ignore_file: Option<PathBuf>,

        /// Generation model name
        #[arg(long, default_value = "gemma3")]
        model: String,

        /// Embedding model name
        #[arg(long, default_value = "nomic-embed-text")]
        embedding_model: String,

        /// OpenAI-compatible API base URL (e.g. http://localhost:11434/v1 for Ollama)
        #[arg(long)]
        base_url: Option<String>,

        /// How many similar mutations to retrieve per query
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum SchemeArg {
    SimpleFifths,
    EveryFifth,
    JackknifedBasePrompts,
    Disabled,
}

impl From<SchemeArg> for CrossValidation {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::SimpleFifths => CrossValidation::SimpleFifths,
            SchemeArg::EveryFifth => CrossValidation::EveryFifth,
            SchemeArg::JackknifedBasePrompts => CrossValidation::JackknifedBasePrompts,
            SchemeArg::Disabled => CrossValidation::Disabled,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            mutations,
            system_prompt,
            input,
            output,
            scheme,
            prompt_field,
            ignore_file,
            model,
            embedding_model,
            base_url,
            top_k,
        } => {
            println!("{}", "Initializing RagFold...".bold().cyan());

            // Local OpenAI-compatible endpoints (Ollama) ignore the key.
            let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();

            // 1. Load inputs. The test file's extension is validated before
            // any model work starts.
            let ignore = load_ignore_set(ignore_file.as_deref())?;
            let corpus = MutationCorpus::load(mutations, &ignore)?;
            println!(
                "Loaded {} mutated prompts (ignoring {} base prompts)",
                corpus.len(),
                corpus.ignored_base_prompts()
            );
            let rows = load_test_rows(input, prompt_field)?;
            let system_prompt = fs::read_to_string(system_prompt)?;

            // 2. Instantiate the external services
            let (factory, generator) = match base_url {
                Some(url) => (
                    EmbeddingIndexFactory::new_with_base_url(
                        api_key.clone(),
                        embedding_model.clone(),
                        url.clone(),
                    ),
                    ChatGenerator::new_with_base_url(
                        api_key,
                        model.clone(),
                        system_prompt,
                        url.clone(),
                    ),
                ),
                None => (
                    EmbeddingIndexFactory::new(api_key.clone(), embedding_model.clone()),
                    ChatGenerator::new(api_key, model.clone(), system_prompt),
                ),
            };
            let arbiter = StdinArbiter;

            // 3. Run, appending each result to the output file as it lands
            let harness = Harness::new(CrossValidation::from(*scheme), *top_k);
            let mut sink = JsonArrayWriter::new(File::create(output)?)?;
            let pipeline = Pipeline {
                index_factory: &factory,
                generator: &generator,
                arbiter: &arbiter,
            };
            let summary = harness
                .run(&corpus, &rows, &ignore, &pipeline, &mut sink)
                .await?;
            sink.finish()?;

            // 4. Report
            println!("Evaluated {} rows across {} folds", summary.tally.total(), summary.fold_sizes.len());
            println!("Tally: {}", summary.tally.to_string().bold());
            println!("Results saved to {}", output.display());
        }
    }

    Ok(())
}

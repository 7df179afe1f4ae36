//! smartstudy 学习助手命令行工具
//!
//! Usage:
//!   smartstudy ask <question...>                      Ask the study assistant
//!   smartstudy quiz <subject> <topic> [options]       Generate a quiz
//!   smartstudy mindmap <file> [options]               Build a mind map from a text file
//!   smartstudy read <file...> --question <text>       Answer a question about text files
//!   smartstudy cache info|clear                       Inspect or empty the response cache

use anyhow::{anyhow, bail, Context};
use smartstudy::document::{Document, DocumentQa};
use smartstudy::mindmap::{Complexity, MindMap, MindMapper};
use smartstudy::quiz::{
    Answer, Difficulty, GeneratedQuiz, QuestionKind, QuizGenerator, QuizPlan, QuizSession, QuizStatus,
};
use smartstudy::session::{ChatAssistant, StudySession};
use smartstudy::structured::Record;
use smartstudy::{PipelineOrchestrator, StudyConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smartstudy=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(args).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let (config_path, args) = take_option(args, "--config");
    let Some(command) = args.first().cloned() else {
        print_usage();
        bail!("missing command");
    };
    let rest = &args[1..];

    match command.as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("smartstudy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "ask" => cmd_ask(load_config(config_path)?, rest).await,
        "quiz" => cmd_quiz(load_config(config_path)?, rest).await,
        "mindmap" => cmd_mindmap(load_config(config_path)?, rest).await,
        "read" => cmd_read(load_config(config_path)?, rest).await,
        "cache" => cmd_cache(load_config(config_path)?, rest).await,
        other => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!(
        r#"smartstudy: SmartStudy 命令行工具

USAGE:
    smartstudy [--config <file>] <COMMAND> [OPTIONS]

COMMANDS:
    ask <question...> [--no-cache]            Ask the study assistant
    quiz <subject> <topic> [--count N] [--kinds mcq,tf,fill,subjective]
         [--difficulty easy|medium|hard] [--no-cache] [--take [--minutes N]]
                                              Generate a quiz and print it with answers,
                                              or take it interactively against a timer
    mindmap <file> [--theme NAME] [--complexity simple|standard|detailed] [--depth N]
                                              Build a mind map from a text file
    read <file...> --question <text> [--no-cache]
                                              Answer a question about text files
    cache info                                Show cache location and entry count
    cache clear                               Remove every cached response
    version                                   Show version information
    help                                      Show this help message

ENVIRONMENT:
    GROQ_API_KEY / SMARTSTUDY_API_KEY         Provider API key
    SMARTSTUDY_MODEL, SMARTSTUDY_BASE_URL     Provider overrides
    SMARTSTUDY_CACHE_DIR                      Cache directory
    RUST_LOG                                  Log filter (default smartstudy=info)"#
    );
}

fn load_config(path: Option<String>) -> anyhow::Result<StudyConfig> {
    let config = match path {
        Some(p) => StudyConfig::load(&p).with_context(|| format!("loading config from {p}"))?,
        None => StudyConfig::from_env()?,
    };
    Ok(config)
}

/// Remove `--name value` from `args`, returning the value.
fn take_option(args: Vec<String>, name: &str) -> (Option<String>, Vec<String>) {
    let mut value = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == name {
            value = iter.next();
        } else {
            rest.push(arg);
        }
    }
    (value, rest)
}

fn take_flag(args: Vec<String>, name: &str) -> (bool, Vec<String>) {
    let before = args.len();
    let rest: Vec<String> = args.into_iter().filter(|a| a != name).collect();
    (rest.len() != before, rest)
}

async fn cmd_ask(config: StudyConfig, args: &[String]) -> anyhow::Result<()> {
    let (no_cache, words) = take_flag(args.to_vec(), "--no-cache");
    if words.is_empty() {
        bail!("usage: smartstudy ask <question...>");
    }
    let question = words.join(" ");

    let pipeline = PipelineOrchestrator::from_config(&config)?;
    let assistant = ChatAssistant::new(pipeline).with_max_attempts(config.retry.max_attempts);
    let mut session = StudySession::new(config.provider.model.as_str()).with_cache(!no_cache);

    let outcome = assistant.reply(&mut session, &question).await;
    println!("{}", outcome.text_or_message());
    if let Some(ref reply) = outcome.text {
        println!("\nYou might also ask:");
        for q in assistant.follow_ups(&session, &question, reply).await {
            println!("  - {q}");
        }
    }
    Ok(())
}

async fn cmd_quiz(config: StudyConfig, args: &[String]) -> anyhow::Result<()> {
    let (count, args) = take_option(args.to_vec(), "--count");
    let (kinds, args) = take_option(args, "--kinds");
    let (difficulty, args) = take_option(args, "--difficulty");
    let (no_cache, args) = take_flag(args, "--no-cache");
    let (take, args) = take_flag(args, "--take");
    let (minutes, args) = take_option(args, "--minutes");
    let [subject, topic] = args.as_slice() else {
        bail!("usage: smartstudy quiz <subject> <topic> [--count N] [--kinds ...]");
    };

    let mut plan = QuizPlan::new(subject.as_str(), topic.as_str());
    if let Some(n) = count {
        plan = plan.with_count(n.parse().map_err(|_| anyhow!("--count expects a number, got {n}"))?);
    }
    if let Some(list) = kinds {
        let kinds = list
            .split(',')
            .map(|k| k.trim().parse::<QuestionKind>())
            .collect::<Result<Vec<_>, _>>()?;
        plan = plan.with_kinds(kinds);
    }
    if let Some(d) = difficulty {
        plan = plan.with_difficulty(d.parse::<Difficulty>()?);
    }

    let pipeline = PipelineOrchestrator::from_config(&config)?;
    let generator = QuizGenerator::new(pipeline, config.provider.model.as_str())
        .with_max_attempts(config.retry.max_attempts)
        .with_unique_attempts(config.quiz.unique_attempts)
        .with_cache(!no_cache);
    let quiz = generator.generate(&plan).await?;

    for warning in &quiz.warnings {
        eprintln!("warning: {warning}");
    }
    for message in quiz.failure_messages() {
        eprintln!("error: {message}");
    }
    if quiz.has_configuration_failure() {
        bail!("quiz generation failed: provider is not configured");
    }

    if take {
        let limit = match minutes {
            Some(m) => {
                let m: u64 = m.parse().map_err(|_| anyhow!("--minutes expects a number, got {m}"))?;
                (m > 0).then(|| Duration::from_secs(m * 60))
            }
            None => config.quiz.time_limit(),
        };
        return take_quiz(quiz, limit).await;
    }

    for (i, q) in quiz.questions.iter().enumerate() {
        println!("{}. [{} | {} marks] {}", i + 1, q.kind, q.marks, q.text());
        print_answer(&q.record.record);
        println!();
    }
    println!("Total marks: {}", quiz.total_marks());
    Ok(())
}

async fn take_quiz(quiz: GeneratedQuiz, limit: Option<Duration>) -> anyhow::Result<()> {
    let mut session = QuizSession::from_generated(quiz, limit);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    for index in 0..session.questions().len() {
        if session.poll() != QuizStatus::InProgress {
            println!("Time is up.");
            break;
        }
        let question = &session.questions()[index];
        let kind = question.kind;
        let clock = session
            .timer()
            .map(|t| format!(" [{} left]", t.display_at(Instant::now())))
            .unwrap_or_default();
        println!("{}. [{} | {} marks]{} {}", index + 1, kind, question.marks, clock, question.text());
        if let Record::MultipleChoice(mc) = &question.record.record {
            for (label, text) in &mc.options {
                println!("   {label}) {text}");
            }
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if let Some(answer) = Answer::from_input(kind, &line) {
            if session.answer(index, answer).is_err() {
                println!("Time is up.");
                break;
            }
        }
    }

    let report = session.submit();
    println!();
    for result in &report.results {
        let verdict = match result.correct {
            Some(true) => "correct",
            Some(false) if !result.answered => "unanswered",
            Some(false) => "wrong",
            None => "graded",
        };
        println!(
            "{}. {:.1}/{} {}",
            result.index + 1,
            result.awarded,
            result.marks,
            verdict
        );
    }
    println!(
        "Score: {:.1}/{} ({:.0}%)",
        report.total_awarded,
        report.total_marks,
        report.percentage()
    );
    Ok(())
}

fn print_answer(record: &Record) {
    match record {
        Record::MultipleChoice(mc) => {
            for (label, text) in &mc.options {
                println!("   {label}) {text}");
            }
            println!("   Answer: {}", mc.correct_label);
        }
        Record::TrueFalse(tf) => println!("   Answer: {}", if tf.correct { "True" } else { "False" }),
        Record::FillBlank(fb) => println!("   Answer: {}", fb.correct_text),
        Record::Subjective(s) => {
            println!("   Model answer: {}", s.ideal_answer);
            for point in &s.key_points {
                println!("   - {point}");
            }
        }
        Record::Grade(g) => println!("   Score: {}/{}", g.score, g.max_marks),
    }
}

async fn cmd_mindmap(config: StudyConfig, args: &[String]) -> anyhow::Result<()> {
    let (theme, args) = take_option(args.to_vec(), "--theme");
    let (complexity, args) = take_option(args, "--complexity");
    let (depth, args) = take_option(args, "--depth");
    let [file] = args.as_slice() else {
        bail!("usage: smartstudy mindmap <file> [--theme NAME] [--complexity LEVEL]");
    };

    let complexity = match complexity.as_deref() {
        None | Some("standard") => Complexity::Standard,
        Some("simple") => Complexity::Simple,
        Some("detailed") => Complexity::Detailed,
        Some(other) => bail!("unknown complexity: {other}"),
    };
    let depth = match depth {
        Some(d) => d.parse().map_err(|_| anyhow!("--depth expects a number, got {d}"))?,
        None => complexity.limits().0,
    };
    let content = tokio::fs::read_to_string(PathBuf::from(file))
        .await
        .with_context(|| format!("reading {file}"))?;

    let pipeline = PipelineOrchestrator::from_config(&config)?;
    let mapper = MindMapper::new(pipeline, config.provider.model.as_str())
        .with_max_attempts(config.retry.max_attempts);
    let map = mapper
        .generate(&content, theme.as_deref().unwrap_or("default"), complexity)
        .await?;
    print_tree(&map, depth);
    Ok(())
}

async fn cmd_read(config: StudyConfig, args: &[String]) -> anyhow::Result<()> {
    let (question, args) = take_option(args.to_vec(), "--question");
    let (no_cache, files) = take_flag(args, "--no-cache");
    let Some(question) = question else {
        bail!("usage: smartstudy read <file...> --question <text>");
    };
    if files.is_empty() {
        bail!("usage: smartstudy read <file...> --question <text>");
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("reading {file}"))?;
        let name = PathBuf::from(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        documents.push(Document::new(name, content));
    }

    let pipeline = PipelineOrchestrator::from_config(&config)?;
    let qa = DocumentQa::new(pipeline, config.provider.model.as_str())
        .with_max_attempts(config.retry.max_attempts)
        .with_cache(!no_cache);
    let outcome = qa.answer(&documents, &question).await?;
    println!("{}", outcome.text_or_message());
    if outcome.error.as_ref().is_some_and(|e| e.is_configuration()) {
        bail!("provider is not configured");
    }
    Ok(())
}

fn print_tree(map: &MindMap, depth: usize) {
    for node in map.to_graph(depth).nodes {
        println!("{}{} ({:?})", "  ".repeat(node.depth), node.label, node.importance);
    }
}

async fn cmd_cache(config: StudyConfig, args: &[String]) -> anyhow::Result<()> {
    let cache = smartstudy::ResponseCache::from_settings(&config.cache);
    match args.first().map(String::as_str) {
        Some("info") => {
            println!("directory: {}", config.cache.dir.display());
            println!("enabled:   {}", cache.is_enabled());
            println!("entries:   {}", cache.len().await);
            Ok(())
        }
        Some("clear") => {
            let removed = cache.clear().await?;
            println!("removed {removed} cached responses");
            Ok(())
        }
        _ => bail!("usage: smartstudy cache info|clear"),
    }
}

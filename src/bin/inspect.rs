use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::ExitCode;
use termsim::{DirModelStore, EmbeddingModel, ModelStore, Result, WordVectors};
use tracing::error;
use tracing_subscriber::EnvFilter;

// checks on a stored model, run independently from the pipeline:
// "s" the K most similar words to each input word
// "a" analogies, each input line holds a quartet "a b c d" and d is searched in b - a + c
// "o" the word that doesn't match the others on each input line
//
// example: inspect a Input/analogies.txt /path/to/project neurosynth

const K: usize = 10;

fn main() -> ExitCode {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termsim=warn")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 5 || !["s", "a", "o"].contains(&args[1].as_str()) {
        error!("usage: inspect <s|a|o> <input file> <base dir> <model tag>");
        return ExitCode::FAILURE;
    }

    match run(&args[1], Path::new(&args[2]), Path::new(&args[3]), &args[4]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(selector: &str, input: &Path, base_dir: &Path, tag: &str) -> Result<()> {

    let model = DirModelStore::new(base_dir).load(tag)?;
    let mut lines: Vec<Vec<String>> = Vec::new();
    for line in BufReader::new(File::open(input)?).lines() {
        let words: Vec<String> = line?.split_whitespace().map(String::from).collect();
        if !words.is_empty() {
            lines.push(words);
        }
    }

    match selector {
        "s" => run_similarity(&lines, &model),
        "a" => run_analogies(&lines, &model),
        _ => run_odd_one_out(&lines, &model),
    }
}

fn run_similarity(inputs: &[Vec<String>], model: &WordVectors) -> Result<()> {

    for token in inputs.iter().flatten() {
        println!("searching {} most similar words to {}", K, token);
        for (i, (similar_token, score)) in model.most_similar(token, K)?.iter().enumerate() {
            println!("{} : {} ? {} = {}", i, token, similar_token, score);
        }
        println!();
    }
    Ok(())
}

fn run_analogies(inputs: &[Vec<String>], model: &WordVectors) -> Result<()> {

    // a is to b as c is to ? translates to b - a + c
    for input in inputs {

        let [a, b, c, target] = match input.as_slice() {
            [a, b, c, d] => [a.as_str(), b.as_str(), c.as_str(), d.as_str()],
            _ => {
                println!("skipping '{}', expected four words", input.join(" "));
                continue;
            }
        };

        let analogies = model.analogy(&[b, c], &[a], K)?;
        for (i, (analogy, score)) in analogies.iter().enumerate() {
            println!("{} : {} - {} + {} ? {} = {}", i, b, a, c, analogy, score);
        }

        match analogies.iter().position(|(analogy, _)| analogy == target) {
            Some(i) => println!("found target '{}' analogy in place {}", target, i + 1),
            None => println!("target '{}' was not found within the first {} analogies", target, K),
        }
        println!();
    }
    Ok(())
}

fn run_odd_one_out(inputs: &[Vec<String>], model: &WordVectors) -> Result<()> {

    for input in inputs {
        let words: Vec<&str> = input.iter().map(String::as_str).collect();
        println!("{} : {}", input.join(" "), model.doesnt_match(&words)?);
    }
    Ok(())
}

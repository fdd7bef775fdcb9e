use jvm2ir::builder::{RawInstListBuilder, Settings};
use jvm2ir::cfg::{InstGraph, SimpleHierarchy};
use jvm2ir::ir::Inst;
use jvm2ir::jvm::{text, MethodBody, Name, RenderDescriptor};
use jvm2ir::*;

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("JVM bytecode to IR lifter")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Print the raw IR and control-flow graphs of the methods in a bytecode listing")
        .arg(
            Arg::new("no-simplify")
                .long("no-simplify")
                .action(ArgAction::SetTrue)
                .help("Print the IR exactly as constructed, without simplification"),
        )
        .arg(
            Arg::new("no-names")
                .long("no-names")
                .action(ArgAction::SetTrue)
                .help("Ignore the local variable tables when naming registers"),
        )
        .arg(
            Arg::new("cfg")
                .long("cfg")
                .action(ArgAction::SetTrue)
                .help("Print each instruction along with its successors and catchers"),
        )
        .arg(
            Arg::new("blocks")
                .long("blocks")
                .action(ArgAction::SetTrue)
                .help("Print the basic blocks of each method"),
        )
        .arg(
            Arg::new("loops")
                .long("loops")
                .action(ArgAction::SetTrue)
                .help("Print the natural loops of each method"),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the control-flow graphs as Graphviz to this file"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Listing file containing the methods to lift")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .index(1),
        )
        .get_matches();

    let mut settings = Settings::new();
    settings.simplify = !matches.get_flag("no-simplify");
    settings.keep_local_variable_names = !matches.get_flag("no-names");

    let input = matches
        .get_one::<PathBuf>("INPUT")
        .ok_or_else(|| Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))?;
    log::info!("Reading '{}'", input.display());
    let source = fs::read_to_string(input)?;
    let methods = text::parse_methods(&source)?;

    let hierarchy = SimpleHierarchy::new();
    let mut dot = String::new();
    let mut failures = 0;
    for method in &methods {
        match lift(method, &settings, &hierarchy, &matches, &mut dot) {
            Ok(()) => (),
            Err(err) => {
                failures += 1;
                log::error!("Failed to lift {}: {}", method_name(method), err);
            }
        }
    }

    if let Some(dot_file) = matches.get_one::<PathBuf>("dot") {
        log::info!("Writing '{}'", dot_file.display());
        fs::write(dot_file, dot)?;
    }

    if failures > 0 {
        log::warn!("{} of {} methods could not be lifted", failures, methods.len());
    }
    Ok(())
}

fn method_name(method: &MethodBody) -> String {
    format!(
        "{}.{}{}",
        method.info.owner.as_str(),
        method.info.name.as_str(),
        method.info.descriptor.render()
    )
}

/// Lift one method and print whatever was asked for
fn lift(
    method: &MethodBody,
    settings: &Settings,
    hierarchy: &SimpleHierarchy,
    matches: &ArgMatches,
    dot: &mut String,
) -> Result<()> {
    let insts: Vec<Inst> = RawInstListBuilder::new(method, settings.clone())?.build()?;

    println!("// {}", method_name(method));
    for inst in &insts {
        match inst {
            Inst::Label(_) => println!("{}", inst),
            _ => println!("    {}", inst),
        }
    }

    let wants_graph = matches.get_flag("cfg")
        || matches.get_flag("blocks")
        || matches.get_flag("loops")
        || matches.contains_id("dot");
    if !wants_graph {
        println!();
        return Ok(());
    }

    let graph = InstGraph::build(insts, hierarchy)?;

    if matches.get_flag("cfg") {
        println!("\n// instruction graph");
        for (inst_ref, inst) in graph.instructions().iter() {
            let location = graph.location(inst_ref);
            let line = location
                .line_number
                .map(|line| format!("line {}", line))
                .unwrap_or_default();
            println!(
                "{:>4} {:<60} succ {:?} catch {:?} {}",
                inst_ref,
                inst.to_string(),
                graph.successors(inst_ref),
                graph.catchers(inst_ref),
                line
            );
        }
        for (exception, throwers) in graph.throw_exits() {
            println!("     throws {} from {:?}", exception, throwers);
        }
    }

    if matches.get_flag("blocks") {
        println!("\n// basic blocks");
        let blocks = graph.block_graph();
        for block in blocks.refs() {
            println!(
                "{}: succ {:?} pred {:?} catch {:?}",
                block,
                blocks.successors(block),
                blocks.predecessors(block),
                blocks.catchers(block)
            );
            for inst in blocks.instructions(block) {
                println!("    {}", inst);
            }
        }
    }

    if matches.get_flag("loops") {
        println!("\n// loops");
        for natural_loop in graph.loops() {
            println!(
                "head {} back jump {} exits {:?} body {:?}",
                natural_loop.head,
                natural_loop.back_jump,
                natural_loop.exits,
                natural_loop.instructions
            );
        }
    }

    if matches.contains_id("dot") {
        dot.push_str(&format!("// {}\n", method_name(method)));
        dot.push_str(&graph.to_dot(true));
    }

    println!();
    Ok(())
}

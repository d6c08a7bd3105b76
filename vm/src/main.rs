use clap::Parser as ClapParser;
use std::process;

use heap::HeapSettings;

use vm::{Machine, MachineSettings, StdoutSink, demos, error_exit};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Demo program to run
    #[arg(required = false, help = "Name of the demo program (see --list)")]
    demo: Option<String>,

    /// Integer parameter of the demo
    #[arg(allow_negative_numbers = true, help = "Demo parameter")]
    arg: Option<i64>,

    /// Initial heap capacity in words
    #[arg(long, default_value_t = HeapSettings::default().initial_words)]
    heap_words: usize,

    /// Largest heap capacity in words
    #[arg(long, default_value_t = HeapSettings::default().max_words)]
    max_heap_words: usize,

    /// Stack limit in words
    #[arg(long, default_value_t = MachineSettings::default().max_stack_words)]
    stack_words: usize,

    /// List the demo programs and exit
    #[arg(long, help = "List demo programs")]
    list: bool,
}

fn list_demos() {
    for d in demos::DEMOS {
        println!("{:<10} {} (default {})", d.name, d.description, d.default_arg);
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let Some(name) = cli.demo.as_deref().filter(|_| !cli.list) else {
        list_demos();
        return;
    };
    let Some(demo) = demos::find(name) else {
        eprintln!("Unknown demo '{}', try --list", name);
        process::exit(1);
    };

    let arg = match demo.arg(cli.arg) {
        Ok(arg) => arg,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let settings = MachineSettings {
        heap: HeapSettings {
            initial_words: cli.heap_words,
            max_words: cli.max_heap_words.max(cli.heap_words),
            ..HeapSettings::default()
        },
        max_stack_words: cli.stack_words,
    };
    if let Err(err) = settings.validate() {
        eprintln!("Invalid settings: {}", err);
        process::exit(1);
    }

    let program = match (demo.build)(arg) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("Error building {}: {}", demo.name, err);
            process::exit(1);
        }
    };

    let mut machine = Machine::new(settings, Box::new(StdoutSink));
    if let Err(err) = machine.run(&program) {
        error_exit(&err);
    }
    log::info!(
        "{}: {} steps, {} collections, stack high water {} words",
        demo.name,
        machine.steps(),
        machine.heap().stats().collections,
        machine.stack().high_water()
    );
}

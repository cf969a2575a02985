use jardelta::archive::{self, ClassEntry};
use jardelta::delta::{self, Patch, PatchCodec};

use clap::{value_parser, Arg, ArgAction, Command};
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

fn main() -> Result<(), delta::Error> {
    env_logger::init();

    let matches = Command::new("JAR delta")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Compute a patch between the classes of two JARs")
        .arg(
            Arg::new("old")
                .long("old")
                .value_name("JAR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Original archive (jar, zip, or jmod)"),
        )
        .arg(
            Arg::new("new")
                .long("new")
                .value_name("JAR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("New archive (jar, zip, or jmod)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATCH")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Where to write the patch"),
        )
        .arg(
            Arg::new("for-agent")
                .long("for-agent")
                .action(ArgAction::SetTrue)
                .requires("added-classes")
                .help("Check the patch can be applied by a Java agent, and split out added classes"),
        )
        .arg(
            Arg::new("added-classes")
                .long("added-classes")
                .value_name("ZIP")
                .value_parser(value_parser!(PathBuf))
                .help("Where to write the added classes (with `--for-agent`)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .default_value("N/A")
                .help("Name of the patch"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .help("Number of worker threads (defaults to the available parallelism)"),
        )
        .get_matches();

    let old_jar = matches.get_one::<PathBuf>("old").expect("required");
    let new_jar = matches.get_one::<PathBuf>("new").expect("required");
    let output = matches.get_one::<PathBuf>("output").expect("required");
    let name = matches.get_one::<String>("name").expect("defaulted");
    let threads = matches.get_one::<usize>("threads").copied().unwrap_or_else(|| {
        thread::available_parallelism().map_or(1, |threads| threads.get())
    });

    for jar in [old_jar, new_jar] {
        if !jar.exists() {
            eprintln!("Archive {} doesn't exist", jar.display());
            return Ok(());
        }
    }

    println!("Calculating delta...");
    let start = Instant::now();
    let differences = delta::calculate_difference(threads, old_jar, new_jar)?;
    println!("Finished in {}ms", start.elapsed().as_millis());

    let mut patch = Patch::new(name.as_str(), differences);

    if matches.get_flag("for-agent") {
        let illegal: Vec<_> = patch.not_runtime_appliable().collect();
        if illegal.is_empty() {
            println!("Patch is valid (for Java agent).");
        } else {
            eprintln!(
                "There are {} illegal patches (for Java agent):",
                illegal.len()
            );
            for difference in illegal {
                log::warn!("Not appliable at runtime: {}", difference);
                eprintln!("{}", difference);
            }
        }

        // `requires` guarantees this is present when `for-agent` is set
        let added_classes = matches
            .get_one::<PathBuf>("added-classes")
            .expect("required by for-agent");
        println!("Writing added classes...");
        let entries = patch
            .take_added_classes()
            .into_iter()
            .map(|added| {
                Ok(ClassEntry {
                    name: format!("{}.class", added.class.name),
                    bytes: added.to_bytes()?,
                })
            })
            .collect::<Result<Vec<_>, delta::Error>>()?;
        archive::write_class_entries(added_classes, &entries)?;
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let codec = PatchCodec::default();
    let file = fs::File::create(output)?;
    patch.write_to(&codec, BufWriter::new(file))?;
    println!("Wrote patch to {}", output.display());

    Ok(())
}

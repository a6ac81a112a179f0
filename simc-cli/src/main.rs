use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use simc_core::pretty::render;
use simc_core::{AttributeDirectory, CompilationSession, CompilerOptions, SyntaxTree};

/// Inspects SIMC attribute files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(
        long,
        value_name = "DIR",
        default_value = ".",
        global = true,
        help = "Root of the attribute library"
    )]
    library: PathBuf,

    #[arg(long, global = true, help = "Compare identifiers case-sensitively")]
    case_sensitive: bool,

    #[arg(long, value_name = "PACKAGE", global = true, help = "Package of the session's classes")]
    package: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "-v for debug, -vv for trace logging")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the attribute files in the library
    List,
    /// Print the declaration tree stored in an attribute file
    Dump { entry: String },
    /// Print the class hierarchy recorded by an attribute file and its externals
    Hierarchy { entry: String },
    /// Re-run the semantic checker over a stored module
    Check { entry: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None);
    if std::env::var_os("RUST_LOG").is_none() {
        let level = match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        builder.filter(None, level);
    }
    let _ = builder.try_init();
}

fn execute(cli: Cli) -> Result<()> {
    let mut options = CompilerOptions {
        case_sensitive: cli.case_sensitive,
        ..CompilerOptions::default()
    };
    if let Some(package) = cli.package {
        options.package = package;
    }
    let library = AttributeDirectory::open(&cli.library)
        .with_context(|| format!("failed to open attribute library {}", cli.library.display()))?;
    let mut session = CompilationSession::new(options);

    match cli.command {
        Command::List => {
            for entry in library.attribute_entries() {
                println!("{entry}");
            }
        }
        Command::Dump { entry } => {
            let mut tree = session.new_tree();
            let loaded = load(&mut session, &mut tree, &entry, &library)?;
            for external in &loaded.externals {
                print!("{}", render(&tree, *external));
            }
            print!("{}", render(&tree, loaded.module));
        }
        Command::Hierarchy { entry } => {
            let mut tree = session.new_tree();
            load(&mut session, &mut tree, &entry, &library)?;
            for (sub, sup) in session.hierarchy().edges() {
                println!("{sub} -> {sup}");
            }
        }
        Command::Check { entry } => {
            let mut tree = session.new_tree();
            let loaded = load(&mut session, &mut tree, &entry, &library)?;
            let block = session.enclose(&mut tree, &loaded);
            let result = session.check(&mut tree, block);
            for diagnostic in session.diagnostics().entries() {
                eprintln!("{entry}: {diagnostic}");
            }
            if let Err(err) = result {
                bail!("{entry}: {err}");
            }
            println!("{entry}: ok");
        }
    }
    Ok(())
}

fn load(
    session: &mut CompilationSession,
    tree: &mut SyntaxTree,
    entry: &str,
    library: &AttributeDirectory,
) -> Result<simc_core::LoadedModule> {
    session.load_attribute_file(tree, entry, library).map_err(|err| {
        let hint = if err.requires_recompile() { " (recompile required)" } else { "" };
        anyhow::anyhow!("failed to load {entry}: {err}{hint}")
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use assert_cmd::Command;
    use predicates::prelude::*;
    use simc_core::decl::{
        BlockDeclaration, ClassDeclaration, ExternalDeclaration, HiddenSpecification,
        SimpleVariableDeclaration,
    };
    use simc_core::{Diagnostics, Kind, NodeData, Type};
    use tempfile::tempdir;

    use super::*;

    /// Writes `VEHICLE.atr` and `CAR.atr` (prefixed by an external Vehicle)
    /// into `root`.
    fn write_library(root: &Path) {
        let mut package = AttributeDirectory::create(root).expect("library root");
        let mut session = CompilationSession::new(CompilerOptions::default());
        let mut diags = Diagnostics::new();

        let mut tree = session.new_tree();
        let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
        let vehicle = tree.add(2, NodeData::Class(ClassDeclaration::new("Vehicle")));
        tree.declare(main, vehicle, &mut diags);
        let wheels = tree.add(
            3,
            NodeData::SimpleVariable(SimpleVariableDeclaration::new("wheels", Type::Integer)),
        );
        tree.declare(vehicle, wheels, &mut diags);
        session.check(&mut tree, main).expect("vehicle checks");
        session
            .emit_attribute_file(&tree, vehicle, &[], &mut package)
            .expect("emit vehicle");

        let mut tree = session.new_tree();
        let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
        let external = tree.add(
            1,
            NodeData::External(ExternalDeclaration::new(
                "Vehicle",
                Kind::Class,
                "simula/user/VEHICLE.atr",
            )),
        );
        tree.declare(main, external, &mut diags);
        let car = tree.add(4, NodeData::Class(ClassDeclaration::new("Car").prefixed("Vehicle")));
        tree.declare(main, car, &mut diags);
        session
            .emit_attribute_file(&tree, car, &[external], &mut package)
            .expect("emit car");
    }

    /// A class that hides an attribute nobody protected; it writes fine
    /// but fails the checker.
    fn write_broken(root: &Path) {
        let mut package = AttributeDirectory::create(root).expect("library root");
        let mut session = CompilationSession::new(CompilerOptions::default());
        let mut tree = session.new_tree();
        let main = tree.add(1, NodeData::Block(BlockDeclaration::new("main")));
        let broken = tree.add(1, NodeData::Class(ClassDeclaration::new("Broken")));
        tree.declare(main, broken, &mut Diagnostics::new());
        let hidden = tree.add(2, NodeData::Hidden(HiddenSpecification::new("x")));
        tree.add_specification(broken, hidden).expect("hidden spec");
        session
            .emit_attribute_file(&tree, broken, &[], &mut package)
            .expect("emit broken");
    }

    fn simc(root: &Path) -> Command {
        let mut cmd = Command::cargo_bin("simc").expect("binary exists");
        cmd.arg("--library").arg(root);
        cmd
    }

    #[test]
    fn lists_attribute_files() {
        let dir = tempdir().expect("tempdir");
        write_library(dir.path());

        simc(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("simula/user/CAR.atr"))
            .stdout(predicate::str::contains("simula/user/VEHICLE.atr"));
    }

    #[test]
    fn dumps_a_module_with_its_externals() {
        let dir = tempdir().expect("tempdir");
        write_library(dir.path());

        simc(dir.path())
            .args(["dump", "simula/user/CAR.atr"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ExternalDeclaration VEHICLE Class from simula/user/VEHICLE.atr"))
            .stdout(predicate::str::contains("Class CAR prefix Vehicle"));
    }

    #[test]
    fn prints_the_recorded_hierarchy() {
        let dir = tempdir().expect("tempdir");
        write_library(dir.path());

        simc(dir.path())
            .args(["hierarchy", "simula/user/CAR.atr"])
            .assert()
            .success()
            .stdout(predicate::str::contains("simula/user/VEHICLE -> simula/runtime/RTS_CLASS"));
    }

    #[test]
    fn checks_a_stored_module() {
        let dir = tempdir().expect("tempdir");
        write_library(dir.path());

        simc(dir.path())
            .args(["check", "simula/user/CAR.atr"])
            .assert()
            .success()
            .stdout(predicate::str::contains("simula/user/CAR.atr: ok"));
    }

    #[test]
    fn reports_checker_errors() {
        let dir = tempdir().expect("tempdir");
        write_broken(dir.path());

        simc(dir.path())
            .args(["check", "simula/user/BROKEN.atr"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("E0103"))
            .stderr(predicate::str::contains("HIDDEN without being PROTECTED"));
    }

    #[test]
    fn reports_corrupt_files() {
        let dir = tempdir().expect("tempdir");
        let package_dir = dir.path().join("simula/user");
        fs::create_dir_all(&package_dir).expect("package dir");
        // a well-formed string that is not the version
        fs::write(package_dir.join("JUNK.atr"), [0u8, 3, 0, b'X', 0, b'Y']).expect("write junk");

        simc(dir.path())
            .args(["dump", "simula/user/JUNK.atr"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("recompile required"));
    }

    #[test]
    fn reports_missing_library() {
        let dir = tempdir().expect("tempdir");

        Command::cargo_bin("simc")
            .expect("binary exists")
            .arg("--library")
            .arg(dir.path().join("missing"))
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to open attribute library"));
    }
}

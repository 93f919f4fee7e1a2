use std::fmt;
use std::io::{self, Write};

use clap::{Arg, ArgAction};
use tracing::debug;

use crate::arch::{ArchModule, ArchModules};
use crate::color::{cwrite, PrintType};
use crate::config::Config;
use crate::dump::{parse_address, MemoryDump};
use crate::kernel::Task;
use crate::registry::{add_arg, add_help, CommandModule, CommandResult, ParsedArgs};
use crate::singleton::Singleton;

/// State shared by every subcommand of one run
pub struct Session {
    pub config: Config,
    pub dump: MemoryDump,
    pub arch: ArchModules<&'static ArchModule>,
    out: Box<dyn Write>,
}

impl Session {
    pub fn new(config: Config, dump: MemoryDump) -> Self {
        let mut arch = ArchModules::builtin(&config.namespace);
        if let Some(machine) = &config.arch.machine {
            arch = arch.with_machine(machine);
        }
        debug!(machine = %arch.machine(), "arch modules ready");
        Self {
            config,
            dump,
            arch,
            out: Box::new(io::stdout()),
        }
    }

    /// Send output somewhere other than stdout
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Print one line, colored as `kind` when color is enabled
    pub fn print(&mut self, kind: Option<PrintType>, text: impl fmt::Display) -> io::Result<()> {
        let kind = if self.config.color { kind } else { None };
        cwrite(&mut self.out, kind, text)
    }
}

/// Subcommands of the `kdump-utils` binary
pub fn module() -> CommandModule<Session> {
    CommandModule::new()
        .define(
            "do_ps",
            "List every task_struct in the snapshot with its pid and command name.",
            do_ps,
            [
                add_help("List tasks"),
                add_arg(
                    Arg::new("comm")
                        .long("comm")
                        .value_name("NAME")
                        .help("Only tasks with this command name"),
                ),
            ],
        )
        .define(
            "do_show_task",
            "Show one task_struct. With --parents, also walk its real_parent chain.",
            do_show_task,
            [
                add_help("Show a task"),
                add_arg(
                    Arg::new("address")
                        .required(true)
                        .help("task_struct address (hex with 0x, or decimal)"),
                ),
                add_arg(
                    Arg::new("parents")
                        .long("parents")
                        .action(ArgAction::SetTrue)
                        .help("Show the parent chain"),
                ),
            ],
        )
        .define(
            "do_arch",
            "Resolve an architecture module for the dump's machine and show its layout.",
            do_arch,
            [
                add_help("Show an architecture module"),
                add_arg(Arg::new("module").required(true).help("Module name, e.g. pgtable")),
            ],
        )
}

fn task_line(task: &Task) -> String {
    let pid = task.pid().map_or_else(|| "?".to_string(), |p| p.to_string());
    format!("{:#018x} {:>7} {}", task.address(), pid, task.comm())
}

fn do_ps(session: &mut Session, args: &ParsedArgs<Session>) -> CommandResult {
    let comm = args.value("comm");
    let addresses: Vec<u64> = session.dump.addresses_of_type("task_struct").collect();

    session.print(None, format!("{:<18} {:>7} COMM", "TASK", "PID"))?;
    for address in addresses {
        let Some(task) = Task::get(&session.dump, address)? else {
            continue;
        };
        if comm.is_some_and(|c| c != task.comm()) {
            continue;
        }
        session.print(Some(PrintType::Link), task_line(&task))?;
    }
    Ok(())
}

fn do_show_task(session: &mut Session, args: &ParsedArgs<Session>) -> CommandResult {
    let raw = args.value("address").ok_or("missing address")?;
    let address = parse_address(raw).map_err(|e| format!("invalid address '{raw}': {e}"))?;

    let Some(task) = Task::get(&session.dump, address)? else {
        session.print(None, "no task at NULL")?;
        return Ok(());
    };

    session.print(Some(PrintType::Link), task_line(&task))?;
    let fields: Vec<String> = task
        .value()
        .fields
        .iter()
        .map(|(name, value)| format!("  {name} = {value}"))
        .collect();
    for line in fields {
        session.print(None, line)?;
    }

    if args.flag("parents") {
        let ancestors = task.ancestors(&session.dump)?;
        session.print(Some(PrintType::Dir), "parents:")?;
        for parent in ancestors {
            session.print(Some(PrintType::Link), task_line(&parent))?;
        }
    }
    Ok(())
}

fn do_arch(session: &mut Session, args: &ParsedArgs<Session>) -> CommandResult {
    let name = args.value("module").ok_or("missing module")?;
    let module = *session.arch.arch_import(name)?;
    let path = crate::arch::module_path(session.arch.namespace(), session.arch.machine(), name);

    session.print(Some(PrintType::Dir), path)?;
    session.print(None, format!("  exports: {}", module.exports.join(", ")))?;

    let layout = module.layout;
    session.print(None, format!("  page size: {:#x}", layout.page_size()))?;
    session.print(None, format!("  levels: {}", layout.levels))?;
    session.print(None, format!("  va bits: {}", layout.va_bits))?;
    session.print(None, format!("  page offset: {:#018x}", layout.page_offset))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::StructValue;
    use crate::registry::CommandParser;
    use clap::Command;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn session(color: bool) -> (Session, SharedBuf) {
        let mut dump = MemoryDump::new();
        dump.insert(
            StructValue::new("task_struct", 0x1000)
                .with_field("pid", 1)
                .with_field("comm", "systemd"),
        );
        dump.insert(
            StructValue::new("task_struct", 0x2000)
                .with_field("pid", 77)
                .with_field("comm", "bash")
                .with_field("real_parent", 0x1000),
        );
        let config = Config {
            color,
            arch: crate::config::ArchConfig {
                machine: Some("x86_64".into()),
            },
            ..Config::default()
        };
        let buf = SharedBuf::default();
        let session = Session::new(config, dump).with_output(Box::new(buf.clone()));
        (session, buf)
    }

    fn run(session: &mut Session, args: &[&str]) -> CommandResult {
        let mut parser = CommandParser::new(Command::new("kdump-utils"));
        parser.add_subcommand_parsers(&module())?;
        let parsed = parser.try_parse_from(args.iter().copied())?;
        parsed.invoke(session)
    }

    #[test]
    fn test_module_commands() {
        let names: Vec<String> = module()
            .commands()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["arch", "ps", "show-task"]);
    }

    #[test]
    fn test_ps_lists_tasks() {
        let (mut session, buf) = session(false);
        run(&mut session, &["kdump-utils", "ps"]).unwrap();

        let out = buf.text();
        assert!(out.starts_with("TASK"));
        assert!(out.contains("systemd"));
        assert!(out.contains("bash"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_ps_comm_filter() {
        let (mut session, buf) = session(false);
        run(&mut session, &["kdump-utils", "ps", "--comm", "bash"]).unwrap();

        let out = buf.text();
        assert!(out.contains("bash"));
        assert!(!out.contains("systemd"));
    }

    #[test]
    fn test_ps_colored() {
        let (mut session, buf) = session(true);
        run(&mut session, &["kdump-utils", "ps"]).unwrap();
        assert!(buf.text().contains("\x1b[0;96m\x1b[1m"));
    }

    #[test]
    fn test_show_task_with_parents() {
        let (mut session, buf) = session(false);
        run(&mut session, &["kdump-utils", "show-task", "0x2000", "--parents"]).unwrap();

        let out = buf.text();
        assert!(out.contains("comm = \"bash\""));
        assert!(out.contains("parents:"));
        assert!(out.contains("systemd"));
    }

    #[test]
    fn test_show_task_null() {
        let (mut session, buf) = session(false);
        run(&mut session, &["kdump-utils", "show-task", "0"]).unwrap();
        assert_eq!(buf.text(), "no task at NULL\n");
    }

    #[test]
    fn test_show_task_bad_address() {
        let (mut session, _) = session(false);
        let err = run(&mut session, &["kdump-utils", "show-task", "0xnope"]).unwrap_err();
        assert!(err.to_string().contains("invalid address"));

        let err = run(&mut session, &["kdump-utils", "show-task", "0x9000"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid address 0x9000");
    }

    #[test]
    fn test_arch_pgtable() {
        let (mut session, buf) = session(false);
        run(&mut session, &["kdump-utils", "arch", "pgtable"]).unwrap();

        let out = buf.text();
        assert!(out.starts_with("kdumplib.linux.arch.x86_64.pgtable\n"));
        assert!(out.contains("PAGE_SHIFT"));
        assert!(out.contains("page size: 0x1000"));
    }

    #[test]
    fn test_arch_unknown_module() {
        let (mut session, _) = session(false);
        let err = run(&mut session, &["kdump-utils", "arch", "smp"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no module named 'kdumplib.linux.arch.x86_64.smp'"
        );
    }
}

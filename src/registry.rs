//! Subcommand registry: builds a clap dispatcher from `do_*` handlers.
//!
//! Handlers are plain functions collected in a [`CommandModule`] under their
//! identifier. Help text and arguments are attached with the [`add_help`] and
//! [`add_arg`] decorators, listed top to bottom the way they read in source:
//!
//! ```ignore
//! let module = CommandModule::new().define(
//!     "do_dump",
//!     "Dump a memory region",
//!     do_dump,
//!     [
//!         add_help("Dump memory region"),
//!         add_arg(Arg::new("start").long("start").required(true)),
//!     ],
//! );
//!
//! let mut parser = CommandParser::new(Command::new("crash"));
//! parser.add_subcommand_parsers(&module)?;
//! let parsed = parser.parse_from(["crash", "dump", "--start=0x1000"]);
//! parsed.invoke(&mut ctx)?;
//! ```

use std::collections::{BTreeMap, HashMap};

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{info, warn};

/// Identifier prefix marking a function as a subcommand handler
pub const HANDLER_PREFIX: &str = "do_";

/// Handler result
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// A subcommand handler, called with the session context and its parsed arguments
pub type Handler<C> = fn(&mut C, &ParsedArgs<C>) -> CommandResult;

/// Errors raised while building the subcommand table.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler '{0}' has no help entry")]
    MissingHelp(String),
}

// ─── Decorators ──────────────────────────────────────────────────────

/// Metadata attached to a handler at definition time.
#[derive(Debug, Clone)]
pub enum Decorator {
    /// Short help shown in the command list
    Help(String),
    /// One argument registered on the handler's sub-parser
    Arg(Arg),
}

/// Decorator for a handler's short help text.
pub fn add_help(text: impl Into<String>) -> Decorator {
    Decorator::Help(text.into())
}

/// Decorator for one subcommand argument.
pub fn add_arg(arg: Arg) -> Decorator {
    Decorator::Arg(arg)
}

#[derive(Debug, Default, Clone)]
struct Metadata {
    help: Vec<String>,
    args: Vec<Arg>,
}

impl Metadata {
    /// Decorators run innermost first, so each one goes to the front.
    fn apply(&mut self, decorator: Decorator) {
        match decorator {
            Decorator::Help(text) => self.help.insert(0, text),
            Decorator::Arg(arg) => self.args.insert(0, arg),
        }
    }
}

// ─── Module ──────────────────────────────────────────────────────────

struct Function<C> {
    doc: String,
    callback: Handler<C>,
}

/// A namespace of functions, some of which are subcommand handlers.
pub struct CommandModule<C> {
    functions: BTreeMap<String, Function<C>>,
    metadata: HashMap<String, Metadata>,
}

impl<C> CommandModule<C> {
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Define a function with its doc text and decorators (top to bottom).
    /// Redefining an identifier replaces its earlier doc and decorators.
    pub fn define(
        mut self,
        ident: &str,
        doc: &str,
        callback: Handler<C>,
        decorators: impl IntoIterator<Item = Decorator>,
    ) -> Self {
        self.metadata.remove(ident);
        let decorators: Vec<Decorator> = decorators.into_iter().collect();
        for decorator in decorators.into_iter().rev() {
            self = self.decorate(ident, decorator);
        }
        self.functions.insert(
            ident.to_string(),
            Function {
                doc: doc.to_string(),
                callback,
            },
        );
        self
    }

    /// Apply one more decorator to `ident`, outermost of those already applied.
    pub fn decorate(mut self, ident: &str, decorator: Decorator) -> Self {
        self.metadata
            .entry(ident.to_string())
            .or_default()
            .apply(decorator);
        self
    }

    /// Every function identifier in the module, sorted
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Descriptors for every `do_*` handler, in identifier order.
    pub fn commands(&self) -> Result<Vec<CommandDescriptor<C>>, RegistryError> {
        for ident in self.metadata.keys() {
            if !self.functions.contains_key(ident) {
                warn!(function = %ident, "decorators attached to an undefined function");
            }
        }

        self.functions
            .iter()
            .filter(|(ident, _)| ident.starts_with(HANDLER_PREFIX))
            .map(|(ident, function)| {
                let meta = self.metadata.get(ident).cloned().unwrap_or_default();
                if meta.help.is_empty() {
                    return Err(RegistryError::MissingHelp(ident.clone()));
                }
                Ok(CommandDescriptor {
                    name: command_name(ident),
                    description: function.doc.clone(),
                    help: meta.help,
                    arguments: meta.args,
                    callback: function.callback,
                })
            })
            .collect()
    }
}

impl<C> Default for CommandModule<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Display name for a handler identifier: `do_show_foo` -> `show-foo`
pub fn command_name(ident: &str) -> String {
    ident
        .strip_prefix(HANDLER_PREFIX)
        .unwrap_or(ident)
        .replace('_', "-")
}

/// Everything needed to build one subcommand.
pub struct CommandDescriptor<C> {
    pub name: String,
    pub description: String,
    pub help: Vec<String>,
    pub arguments: Vec<Arg>,
    pub callback: Handler<C>,
}

impl<C> CommandDescriptor<C> {
    /// Sub-parser with an explicit `-h/--help` and the declared arguments.
    pub fn sub_parser(&self) -> Command {
        let mut parser = Command::new(self.name.clone())
            .about(self.help[0].clone())
            .disable_help_flag(true)
            .arg(
                Arg::new("help")
                    .short('h')
                    .long("help")
                    .action(ArgAction::HelpLong)
                    .help("Print help"),
            );
        if !self.description.is_empty() {
            parser = parser.long_about(self.description.clone());
        }
        for arg in &self.arguments {
            parser = parser.arg(arg.clone());
        }
        parser
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Top-level parser plus the handler registered for each subcommand.
pub struct CommandParser<C> {
    command: Command,
    handlers: HashMap<String, Handler<C>>,
}

impl<C> CommandParser<C> {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            handlers: HashMap::new(),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Add one sub-parser per handler of `module`.
    ///
    /// Fails before touching the parser if any handler lacks a help entry.
    pub fn add_subcommand_parsers(&mut self, module: &CommandModule<C>) -> Result<(), RegistryError> {
        let commands = module.commands()?;

        let mut command = self
            .command
            .clone()
            .subcommand_required(true)
            .subcommand_help_heading("commands")
            .subcommand_value_name("COMMAND")
            .disable_help_subcommand(true);

        for descriptor in commands {
            info!(
                command = %descriptor.name,
                arguments = descriptor.arguments.len(),
                "registering subcommand"
            );
            command = command.subcommand(descriptor.sub_parser());
            self.handlers.insert(descriptor.name, descriptor.callback);
        }

        self.command = command;
        Ok(())
    }

    /// Parse `args` (program name first) and resolve the handler.
    pub fn try_parse_from<I, T>(&self, args: I) -> Result<ParsedArgs<C>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let global = self.command.clone().try_get_matches_from(args)?;

        let Some((name, matches)) = global.subcommand() else {
            return Err(self
                .command
                .clone()
                .error(ErrorKind::MissingSubcommand, "a subcommand is required"));
        };
        let Some(func) = self.handlers.get(name).copied() else {
            return Err(self
                .command
                .clone()
                .error(ErrorKind::InvalidSubcommand, format!("no handler for '{name}'")));
        };

        Ok(ParsedArgs {
            command: name.to_string(),
            func,
            matches: matches.clone(),
            global: global.clone(),
        })
    }

    /// Like [`try_parse_from`](Self::try_parse_from), exiting with usage on error.
    pub fn parse_from<I, T>(&self, args: I) -> ParsedArgs<C>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        self.try_parse_from(args).unwrap_or_else(|e| e.exit())
    }
}

/// Result of a successful parse: the chosen subcommand and its handler.
pub struct ParsedArgs<C> {
    pub command: String,
    pub func: Handler<C>,
    /// Arguments of the subcommand
    pub matches: ArgMatches,
    /// Arguments of the top-level command
    pub global: ArgMatches,
}

impl<C> ParsedArgs<C> {
    /// Dispatch to the handler
    pub fn invoke(&self, ctx: &mut C) -> CommandResult {
        (self.func)(ctx, self)
    }

    /// String value of a subcommand argument
    pub fn value(&self, id: &str) -> Option<&str> {
        self.matches
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .map(String::as_str)
    }

    /// Flag value of a subcommand argument; false when undeclared
    pub fn flag(&self, id: &str) -> bool {
        self.matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }

    /// String value of a top-level argument
    pub fn global_value(&self, id: &str) -> Option<&str> {
        self.global
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .map(String::as_str)
    }
}

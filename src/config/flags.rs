//! The flag registry.
//!
//! A [`FlagSet`] maps dotted flag names to bindings. Field bindings read and
//! write the target struct directly; owned bindings (such as `--config`) keep
//! their value inside the flag. Command-line parsing is delegated to `clap`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use super::error::FlagError;
use super::schema::Accessor;
use super::value::FlagKind;

enum Binding<T> {
    Field(Arc<dyn Accessor<T>>),
    Owned(String),
}

/// A single registered flag.
pub struct Flag<T> {
    name: String,
    short: Option<char>,
    usage: String,
    kind: FlagKind,
    default: String,
    changed: bool,
    binding: Binding<T>,
}

impl<T> Flag<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    /// The value the flag held when it was registered.
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Whether the flag was set explicitly since registration.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// The current value, rendered as text.
    pub fn value(&self, target: &T) -> String {
        match &self.binding {
            Binding::Field(accessor) => accessor.render(target),
            Binding::Owned(value) => value.clone(),
        }
    }

    /// The current value of a flag that stores its own value.
    pub fn owned_value(&self) -> Option<&str> {
        match &self.binding {
            Binding::Owned(value) => Some(value),
            Binding::Field(_) => None,
        }
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .help(self.usage.clone())
            .value_name(self.kind.to_string());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        arg = match self.kind {
            FlagKind::Bool => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            kind if kind.is_collection() => arg.action(ArgAction::Append).allow_hyphen_values(true),
            _ => arg.action(ArgAction::Set).allow_hyphen_values(true),
        };
        if !self.default.is_empty() {
            arg = arg.default_value(self.default.clone());
        }
        arg
    }
}

impl<T> fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("short", &self.short)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

/// An ordered collection of flags bound to a target of type `T`.
pub struct FlagSet<T> {
    name: String,
    flags: Vec<Flag<T>>,
    by_name: HashMap<String, usize>,
    by_short: HashMap<char, usize>,
}

impl<T: 'static> FlagSet<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
            by_name: HashMap::new(),
            by_short: HashMap::new(),
        }
    }

    /// Registers a string flag that keeps its value inside the registry.
    pub fn add_owned(
        &mut self,
        name: &str,
        short: Option<&str>,
        default: &str,
        usage: &str,
    ) -> Result<(), FlagError> {
        self.insert(Flag {
            name: name.to_string(),
            short: parse_short(name, short)?,
            usage: usage.to_string(),
            kind: FlagKind::String,
            default: default.to_string(),
            changed: false,
            binding: Binding::Owned(default.to_string()),
        })
    }

    /// Registers a flag bound to a field of `target`; the field's current
    /// value becomes the default.
    pub(crate) fn add_field(
        &mut self,
        name: &str,
        short: Option<&str>,
        usage: &str,
        kind: FlagKind,
        accessor: Arc<dyn Accessor<T>>,
        target: &T,
    ) -> Result<(), FlagError> {
        let default = accessor.render(target);
        self.insert(Flag {
            name: name.to_string(),
            short: parse_short(name, short)?,
            usage: usage.to_string(),
            kind,
            default,
            changed: false,
            binding: Binding::Field(accessor),
        })
    }

    fn insert(&mut self, flag: Flag<T>) -> Result<(), FlagError> {
        if self.by_name.contains_key(&flag.name) {
            return Err(FlagError::Redefined(flag.name));
        }
        if let Some(short) = flag.short {
            if let Some(&existing) = self.by_short.get(&short) {
                return Err(FlagError::ShorthandRedefined {
                    short,
                    name: flag.name,
                    existing: self.flags[existing].name.clone(),
                });
            }
            self.by_short.insert(short, self.flags.len());
        }
        tracing::trace!(flag = %flag.name, kind = %flag.kind, "registered flag");
        self.by_name.insert(flag.name.clone(), self.flags.len());
        self.flags.push(flag);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&Flag<T>> {
        self.by_name.get(name).map(|&i| &self.flags[i])
    }

    pub fn shorthand_lookup(&self, short: char) -> Option<&Flag<T>> {
        self.by_short.get(&short).map(|&i| &self.flags[i])
    }

    /// All flags in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag<T>> {
        self.flags.iter()
    }

    /// Flags that were set explicitly, in registration order.
    pub fn changed(&self) -> impl Iterator<Item = &Flag<T>> {
        self.flags.iter().filter(|f| f.changed)
    }

    /// Parses `value` into the named flag and marks it as changed.
    pub fn set(&mut self, target: &mut T, name: &str, value: &str) -> Result<(), FlagError> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| FlagError::NotFound(name.to_string()))?;
        let flag = &mut self.flags[index];
        match &mut flag.binding {
            Binding::Field(accessor) => {
                accessor
                    .assign(target, value)
                    .map_err(|reason| FlagError::InvalidValue {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason,
                    })?
            }
            Binding::Owned(slot) => *slot = value.to_string(),
        }
        flag.changed = true;
        Ok(())
    }

    /// Adds every flag to an existing command.
    ///
    /// clap's generated help flag is replaced by one that only takes
    /// `--help` and `-h` when no registered flag already uses them.
    pub fn augment(&self, command: Command) -> Command {
        let command = command
            .disable_help_flag(true)
            .args(self.flags.iter().map(Flag::to_arg));
        let help_taken = self.by_name.contains_key("help")
            || command.get_arguments().any(|arg| arg.get_id() == "help");
        if help_taken {
            return command;
        }
        let mut help = Arg::new("help")
            .long("help")
            .action(ArgAction::Help)
            .help("Print help");
        if !self.by_short.contains_key(&'h') {
            help = help.short('h');
        }
        command.arg(help)
    }

    /// A standalone command carrying every flag.
    pub fn command(&self) -> Command {
        self.augment(Command::new(self.name.clone()).args_override_self(true))
    }

    /// Applies every value that came from the command line in `matches`.
    pub fn apply_matches(&mut self, target: &mut T, matches: &ArgMatches) -> Result<(), FlagError> {
        let explicit: Vec<(String, String)> = self
            .flags
            .iter()
            .filter(|f| matches.value_source(&f.name) == Some(ValueSource::CommandLine))
            .map(|f| {
                let values: Vec<&str> = matches
                    .get_many::<String>(&f.name)
                    .map(|values| values.map(String::as_str).collect())
                    .unwrap_or_default();
                (f.name.clone(), values.join(","))
            })
            .collect();

        for (name, value) in explicit {
            self.set(target, &name, &value)?;
        }
        Ok(())
    }

    /// Parses `args` (including the program name) and applies the result.
    pub fn parse_from<I, S>(&mut self, target: &mut T, args: I) -> Result<ArgMatches, FlagError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        let matches = self.command().try_get_matches_from(args)?;
        self.apply_matches(target, &matches)?;
        Ok(matches)
    }
}

impl<T> fmt::Debug for FlagSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish()
    }
}

fn parse_short(name: &str, short: Option<&str>) -> Result<Option<char>, FlagError> {
    let Some(short) = short else {
        return Ok(None);
    };
    let mut chars = short.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Some(c)),
        _ => Err(FlagError::InvalidShorthand {
            name: name.to_string(),
            short: short.to_string(),
        }),
    }
}

use arrayvec::ArrayVec;

use crate::config::{COMMAND_LEN, NAME_LEN};
use crate::error::{SysError, SysResult};

/// A command line split into program name and argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: ArrayVec<u8, NAME_LEN>,
    pub args: ArrayVec<u8, COMMAND_LEN>,
}

impl Command {
    /// Splits `line` at the first space run. Input stops at a NUL if present.
    ///
    /// The argument string is kept verbatim after the separating spaces.
    pub fn parse(line: &[u8]) -> SysResult<Self> {
        let line = match line.iter().position(|&b| b == 0) {
            Some(end) => &line[..end],
            None => line,
        };
        if line.len() > COMMAND_LEN {
            return Err(SysError::InvalidArgument);
        }

        let start = line.iter().position(|&b| b != b' ').unwrap_or(line.len());
        let line = &line[start..];
        let name_end = line.iter().position(|&b| b == b' ').unwrap_or(line.len());
        let (name, rest) = line.split_at(name_end);
        if name.is_empty() {
            return Err(SysError::InvalidArgument);
        }

        let args_start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());

        let mut command = Command { name: ArrayVec::new(), args: ArrayVec::new() };
        command
            .name
            .try_extend_from_slice(name)
            .map_err(|_| SysError::InvalidArgument)?;
        command
            .args
            .try_extend_from_slice(&rest[args_start..])
            .map_err(|_| SysError::InvalidArgument)?;
        Ok(command)
    }
}

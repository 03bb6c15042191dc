//! Tabular listing of every container record under the state root.

use std::io::{self, Write};
use std::path::Path;

use clap::Parser;
use tabwriter::TabWriter;

use crate::container;
use crate::error::{Error, Result};
use crate::state::StateStore;

#[derive(Parser, Debug)]
pub struct List {}

impl List {
    pub fn exec(&self, root_path: &Path) -> Result<()> {
        let store = StateStore::new(root_path);
        let containers = container::list(&store)?;

        let mut tab_writer = TabWriter::new(io::stdout());
        writeln!(&mut tab_writer, "ID\tSTATUS\tPID\tBUNDLE").map_err(io_err)?;
        for info in containers {
            writeln!(
                &mut tab_writer,
                "{}\t{}\t{}\t{}",
                info.id, info.status, info.pid, info.bundle
            )
            .map_err(io_err)?;
        }
        tab_writer.flush().map_err(io_err)?;

        Ok(())
    }
}

fn io_err(cause: io::Error) -> Error {
    Error::StateIo {
        path: "<stdout>".into(),
        cause,
    }
}

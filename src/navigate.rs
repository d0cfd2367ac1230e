//! Navigation through the entity tree.
//!
//! A position is a stack of frames, the first one always a base. Every further frame is
//! reached through a `(label, index)` step where `index` is the 1-based ordinal among the
//! siblings carrying `label`, or `0` to read `label` as a child name.

use crate::names::BcDataType;
use crate::prelude::*;
use crate::tree::{EntityKind, EntityTree, Handle, Label};

/// deepest position below a base
pub const MAX_GOTO_DEPTH: usize = 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("positions are limited to {MAX_GOTO_DEPTH} levels below the base")]
    TooDeep,
    #[error("`{label}` is not a valid child label of `{parent}`")]
    InvalidLabel { label: String, parent: String },
    #[error("`{parent}` has no {label} number {index}")]
    NoSuchChild {
        label: Label,
        index: usize,
        parent: String,
    },
    #[error("`{parent}` has no child named `{name}`")]
    NoSuchName { name: String, parent: String },
    #[error("BCData_t is addressed as 2 (Dirichlet) or 3 (Neumann), not {0}")]
    BcDataIndex(usize),
    #[error("cannot move above the base")]
    AboveBase,
    #[error("no base named `{0}`")]
    NoSuchBase(String),
    #[error("malformed path `{0}`")]
    BadPath(String),
}

impl NavigationError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NavigationError::NoSuchChild { .. }
                | NavigationError::NoSuchName { .. }
                | NavigationError::NoSuchBase(_)
        )
    }
}

/// a saved position that can be replayed with
/// [`Session::goto_location`](crate::Session::goto_location)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub(crate) file_number: u64,
    pub(crate) base: usize,
    pub(crate) labels: Vec<String>,
    pub(crate) indices: Vec<usize>,
}

impl Location {
    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    /// 1-based index of the base
    pub fn base(&self) -> usize {
        self.base
    }

    /// number of levels below the base
    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    label: Label,
    /// ordinal among siblings of the same label, the BCData code for `BCData_t`
    index: usize,
    handle: Handle,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Position {
    file_number: u64,
    base: usize,
    frames: Vec<Frame>,
}

/// what a single step did
enum Step {
    Moved,
    Stop,
}

impl Position {
    /// position at the `base`-th base of the file
    pub(crate) fn at_base(tree: &EntityTree, file_number: u64, base: usize) -> Result<Self, Error> {
        let root = tree.root();
        let handle = tree
            .child_by_label(root, Label::Base, base)?
            .ok_or(NavigationError::NoSuchChild {
                label: Label::Base,
                index: base,
                parent: "file root".to_string(),
            })?;

        Ok(Self {
            file_number,
            base,
            frames: vec![Frame {
                label: Label::Base,
                index: base,
                handle,
            }],
        })
    }

    /// position at the base called `name`
    pub(crate) fn at_base_named(
        tree: &EntityTree,
        file_number: u64,
        name: &str,
    ) -> Result<Self, Error> {
        let handle = tree
            .child_named(tree.root(), name)?
            .ok_or_else(|| NavigationError::NoSuchBase(name.to_string()))?;
        let base = tree.ordinal(handle)?;
        Self::at_base(tree, file_number, base)
    }

    pub(crate) fn file_number(&self) -> u64 {
        self.file_number
    }

    pub(crate) fn current(&self) -> Handle {
        self.frames[self.frames.len() - 1].handle
    }

    /// levels below the base
    pub(crate) fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// apply `steps` in order, stopping at an `end` marker or an empty label
    pub(crate) fn descend<S: AsRef<str>>(
        &mut self,
        tree: &EntityTree,
        steps: &[(S, usize)],
    ) -> Result<(), Error> {
        let significant = steps
            .iter()
            .take_while(|(label, _)| !is_end(label.as_ref()))
            .count();
        if significant > MAX_GOTO_DEPTH {
            return Err(NavigationError::TooDeep.into());
        }

        for (label, index) in steps {
            if let Step::Stop = self.step(tree, label.as_ref(), *index)? {
                break;
            }
        }
        Ok(())
    }

    fn step(&mut self, tree: &EntityTree, label: &str, index: usize) -> Result<Step, Error> {
        if is_end(label) {
            return Ok(Step::Stop);
        }
        match label {
            "." => return Ok(Step::Moved),
            ".." => {
                if self.frames.len() == 1 {
                    return Err(NavigationError::AboveBase.into());
                }
                self.frames.pop();
                return Ok(Step::Moved);
            }
            _ => {}
        }

        if self.depth() >= MAX_GOTO_DEPTH {
            return Err(NavigationError::TooDeep.into());
        }

        let current = self.current();
        let frame = if index == 0 {
            self.resolve_name(tree, current, label)?
        } else {
            self.resolve_label(tree, current, label, index)?
        };

        log::debug!(
            "navigated to {} {} (`{}`) at depth {}",
            frame.label,
            frame.index,
            tree.get(frame.handle)?.name(),
            self.frames.len()
        );
        self.frames.push(frame);
        Ok(Step::Moved)
    }

    fn resolve_name(&self, tree: &EntityTree, current: Handle, name: &str) -> Result<Frame, Error> {
        let parent = tree.get(current)?;
        let handle = tree.child_named(current, name)?.ok_or_else(|| NavigationError::NoSuchName {
            name: name.to_string(),
            parent: parent.name().to_string(),
        })?;

        let child = tree.get(handle)?;
        let label = child
            .label()
            .ok_or_else(|| Error::internal("the file root appears as a child"))?;
        let index = match &child.kind {
            EntityKind::BCData(data_type) => data_type.code() as usize,
            _ => tree.ordinal(handle)?,
        };

        Ok(Frame { label, index, handle })
    }

    fn resolve_label(
        &self,
        tree: &EntityTree,
        current: Handle,
        label: &str,
        index: usize,
    ) -> Result<Frame, Error> {
        let parent = tree.get(current)?;
        let invalid = || NavigationError::InvalidLabel {
            label: label.to_string(),
            parent: parent.name().to_string(),
        };

        let label = Label::parse(label).ok_or_else(invalid)?;
        if !parent.kind.allows(label) {
            return Err(invalid().into());
        }

        let handle = if label == Label::BCData {
            let data_type = i64::try_from(index)
                .ok()
                .and_then(|code| BcDataType::from_code(code).ok())
                .ok_or(NavigationError::BcDataIndex(index))?;
            tree.child_named(current, data_type.node_name())?
        } else {
            tree.child_by_label(current, label, index)?
        };

        let handle = handle.ok_or_else(|| NavigationError::NoSuchChild {
            label,
            index,
            parent: parent.name().to_string(),
        })?;

        Ok(Frame { label, index, handle })
    }

    pub(crate) fn location(&self) -> Location {
        let below = &self.frames[1..];
        Location {
            file_number: self.file_number,
            base: self.base,
            labels: below.iter().map(|f| f.label.as_str().to_string()).collect(),
            indices: below.iter().map(|f| f.index).collect(),
        }
    }
}

fn is_end(label: &str) -> bool {
    label.is_empty() || label.eq_ignore_ascii_case("end")
}

/// split a `/`-separated path. Absolute paths return the base name first
pub(crate) fn split_path(path: &str) -> Result<(Option<&str>, Vec<&str>), NavigationError> {
    let bad = || NavigationError::BadPath(path.to_string());
    let absolute = path.starts_with('/');
    let mut components = path.split('/').filter(|c| !c.is_empty());

    if absolute {
        let base = components.next().ok_or_else(bad)?;
        if base == "." || base == ".." {
            return Err(bad());
        }
        Ok((Some(base), components.collect()))
    } else {
        let rest: Vec<&str> = components.collect();
        if rest.is_empty() {
            return Err(bad());
        }
        Ok((None, rest))
    }
}

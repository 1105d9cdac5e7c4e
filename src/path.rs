//! Path resolution and manipulation utilities.

use crate::config::ROOT_BLOCK_ID;
use crate::directory::dir_lookup;
use crate::node::{corrupt, read_node};
use crate::structs::{Node, NodeType};
use crate::{BlockDevice, Result};

/// Splits a `/`-delimited path into its components, dropping empty segments.
pub fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Joins a parent path and a single name.
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{}/{}", parent, name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Resolve the last component itself.
    Target,
    /// Stop one component early and return the directory that would hold it.
    Parent,
}

/// Resolves `path` from the root directory.
///
/// Intermediate components must be directories; the last one must intersect
/// `ntype` (ignored in `Lookup::Parent` mode, where the result is always a
/// directory). The empty path names the root.
/// Returns `Ok(None)` when some component does not resolve, and an error when
/// the tree is corrupt along the way.
pub fn find_node(
    device: &dyn BlockDevice,
    path: &str,
    ntype: NodeType,
    lookup: Lookup,
) -> Result<Option<(u32, Node)>> {
    let mut components = split(path);
    if lookup == Lookup::Parent && components.pop().is_none() {
        return Ok(None);
    }

    let (mut block, mut node) = read_node(device, ROOT_BLOCK_ID)?;
    if !node.is_dir() {
        return Err(corrupt(ROOT_BLOCK_ID, "root is not a directory"));
    }
    let mut block_id = ROOT_BLOCK_ID;

    for (i, component) in components.iter().enumerate() {
        let last = i + 1 == components.len();
        let target = if last && lookup == Lookup::Target {
            ntype
        } else {
            NodeType::DIRECTORY
        };
        match dir_lookup(device, &block, &node, component, target)? {
            Some((child_id, child)) => {
                block_id = child_id;
                node = child;
                if !last {
                    block = read_node(device, child_id)?.0;
                }
            }
            None => return Ok(None),
        }
    }

    if lookup == Lookup::Target && components.is_empty() && !ntype.contains(NodeType::DIRECTORY) {
        return Ok(None);
    }
    Ok(Some((block_id, node)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("/dev/stdout"), vec!["dev", "stdout"]);
        assert_eq!(split("//a///b/"), vec!["a", "b"]);
        assert_eq!(split("relative"), vec!["relative"]);
        assert!(split("/").is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/dev", "tty"), "/dev/tty");
        assert_eq!(join("/", "etc"), "/etc");
        assert_eq!(join("", "etc"), "/etc");
    }
}

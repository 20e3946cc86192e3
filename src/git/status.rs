//! Classification of `git status --porcelain` output.

use tracing::debug;

/// Files grouped by the kind of change, in the order git reported them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChangeSet {
    pub new_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub deleted_files: Vec<String>,
    /// (old path, new path)
    pub renamed_files: Vec<(String, String)>,
}

impl FileChangeSet {
    /// True when git reported nothing to commit
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of entries across all buckets
    pub fn total(&self) -> usize {
        self.new_files.len()
            + self.modified_files.len()
            + self.deleted_files.len()
            + self.renamed_files.len()
    }

    /// Every path touched by these changes, in bucket order.
    ///
    /// Renames contribute both sides.
    pub fn paths_to_stage(&self) -> Vec<String> {
        let mut paths = self.present_paths();
        paths.extend(self.removed_paths());
        paths
    }

    /// Paths that still exist in the working tree: new, modified and the
    /// destination of each rename
    pub fn present_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.total());
        paths.extend(self.new_files.iter().cloned());
        paths.extend(self.modified_files.iter().cloned());
        paths.extend(self.renamed_files.iter().map(|(_, new)| new.clone()));
        paths
    }

    /// Paths gone from the working tree: deletions and the source of each
    /// rename. `git add` rejects these once the removal is already staged.
    pub fn removed_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.deleted_files.len() + self.renamed_files.len());
        paths.extend(self.deleted_files.iter().cloned());
        paths.extend(self.renamed_files.iter().map(|(old, _)| old.clone()));
        paths
    }
}

/// Bucket a single porcelain status code falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    New,
    Modified,
    Deleted,
    Renamed,
}

fn bucket_for(index: char, worktree: char) -> Bucket {
    match (index, worktree) {
        ('?', '?') => Bucket::New,
        ('R', _) | (_, 'R') => Bucket::Renamed,
        ('D', _) | (_, 'D') => Bucket::Deleted,
        ('A', _) => Bucket::New,
        ('M', _) | (_, 'M') => Bucket::Modified,
        // Copies, type changes, unmerged entries and anything newer than
        // this table are still reported rather than dropped.
        _ => Bucket::Modified,
    }
}

/// Parse porcelain v1 output into a [`FileChangeSet`].
///
/// Each file line lands in exactly one bucket. Blank lines and `##` branch
/// headers are not file entries and are skipped.
pub fn classify(porcelain: &str) -> FileChangeSet {
    let mut changes = FileChangeSet::default();

    for line in porcelain.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with("## ") {
            continue;
        }

        let mut chars = line.chars();
        let (index, worktree) = match (chars.next(), chars.next()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                debug!(line, "Skipping status line without a path");
                continue;
            }
        };
        let rest = if line.as_bytes().get(2) == Some(&b' ') {
            line.get(3..).unwrap_or("")
        } else {
            line.get(2..).unwrap_or("").trim_start()
        };
        if rest.is_empty() {
            debug!(line, "Skipping status line without a path");
            continue;
        }

        match bucket_for(index, worktree) {
            Bucket::New => changes.new_files.push(unquote(rest)),
            Bucket::Deleted => changes.deleted_files.push(unquote(rest)),
            Bucket::Renamed => {
                let (old, new) = split_arrow(rest);
                changes.renamed_files.push((old, new));
            }
            Bucket::Modified => {
                // Copies carry an arrow too; the destination is what changed
                let path = if rest.contains(" -> ") {
                    split_arrow(rest).1
                } else {
                    unquote(rest)
                };
                changes.modified_files.push(path);
            }
        }
    }

    changes
}

/// Split `old -> new`, honouring quoted paths on either side
fn split_arrow(segment: &str) -> (String, String) {
    if let Some(after_quote) = segment.strip_prefix('"') {
        // Find the closing quote of the first path, skipping escaped quotes
        let mut escaped = false;
        for (i, c) in after_quote.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let old = &segment[..i + 2];
                    let new = after_quote[i + 1..].trim_start_matches(" -> ");
                    return (unquote(old), unquote(new));
                }
                _ => escaped = false,
            }
        }
    }

    match segment.split_once(" -> ") {
        Some((old, new)) => (unquote(old), unquote(new)),
        None => (unquote(segment), unquote(segment)),
    }
}

/// Undo git's C-style quoting of paths with special characters
fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                // Octal escape: up to three digits encoding one raw byte
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Extract the branch name from the `## ` header of `git status --porcelain -b`
pub fn branch_from_header(output: &str) -> Option<String> {
    let header = output.lines().next()?.strip_prefix("## ")?;
    let header = header
        .strip_prefix("No commits yet on ")
        .or_else(|| header.strip_prefix("Initial commit on "))
        .unwrap_or(header);
    let branch = header
        .split("...")
        .next()?
        .split_whitespace()
        .next()?;

    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output_is_empty_change_set() {
        let changes = classify("");
        assert!(changes.is_empty());
        assert_eq!(changes, FileChangeSet::default());
    }

    #[test]
    fn test_basic_buckets() {
        let output = "?? a.txt\n M b.txt\nM  c.txt\n D d.txt\nD  e.txt\nR  old.rs -> new.rs\n";
        let changes = classify(output);

        assert_eq!(changes.new_files, vec!["a.txt"]);
        assert_eq!(changes.modified_files, vec!["b.txt", "c.txt"]);
        assert_eq!(changes.deleted_files, vec!["d.txt", "e.txt"]);
        assert_eq!(
            changes.renamed_files,
            vec![("old.rs".to_string(), "new.rs".to_string())]
        );
    }

    #[test]
    fn test_every_line_lands_in_exactly_one_bucket() {
        let lines = [
            "?? new.txt",
            " M worktree.txt",
            "M  index.txt",
            "MM both.txt",
            "A  added.txt",
            "AM added_then_modified.txt",
            "AD added_then_deleted.txt",
            " D gone.txt",
            "MD modified_then_deleted.txt",
            "R  a.txt -> b.txt",
            "RM c.txt -> d.txt",
            "C  e.txt -> f.txt",
            "UU conflict.txt",
            " T typechange.txt",
            "!! ignored.txt",
            "XY unknown.txt",
        ];
        let changes = classify(&lines.join("\n"));
        assert_eq!(changes.total(), lines.len());
    }

    #[test]
    fn test_added_to_index_is_new() {
        let changes = classify("A  added.txt\nAM added_then_modified.txt\n");
        assert_eq!(changes.new_files, vec!["added.txt", "added_then_modified.txt"]);
    }

    #[test]
    fn test_unknown_codes_fall_back_to_modified() {
        let changes = classify("UU conflict.txt\n T typechange.txt\nXY odd.txt\n");
        assert_eq!(
            changes.modified_files,
            vec!["conflict.txt", "typechange.txt", "odd.txt"]
        );
    }

    #[test]
    fn test_copy_uses_destination_path() {
        let changes = classify("C  template.txt -> copy.txt\n");
        assert_eq!(changes.modified_files, vec!["copy.txt"]);
        assert!(changes.renamed_files.is_empty());
    }

    #[test]
    fn test_quoted_paths() {
        let output = "?? \"with space.txt\"\n M \"tab\\there.txt\"\n?? \"caf\\303\\251.txt\"\n";
        let changes = classify(output);
        assert_eq!(changes.new_files, vec!["with space.txt", "café.txt"]);
        assert_eq!(changes.modified_files, vec!["tab\there.txt"]);
    }

    #[test]
    fn test_quoted_rename() {
        let changes = classify("R  \"old -> name.txt\" -> \"new \\\"name\\\".txt\"\n");
        assert_eq!(
            changes.renamed_files,
            vec![(
                "old -> name.txt".to_string(),
                "new \"name\".txt".to_string()
            )]
        );
    }

    #[test]
    fn test_skips_headers_and_blank_lines() {
        let changes = classify("## main...origin/main\n\n?? a.txt\r\n");
        assert_eq!(changes.total(), 1);
        assert_eq!(changes.new_files, vec!["a.txt"]);
    }

    #[test]
    fn test_paths_to_stage_includes_both_sides_of_rename() {
        let changes = classify("?? a.txt\n M b.txt\n D c.txt\nR  d.txt -> e.txt\n");
        assert_eq!(
            changes.paths_to_stage(),
            vec!["a.txt", "b.txt", "e.txt", "c.txt", "d.txt"]
        );
    }

    #[test]
    fn test_removed_paths_are_kept_apart() {
        let changes = classify("?? a.txt\nD  c.txt\nR  d.txt -> e.txt\n M f.txt\n");
        assert_eq!(changes.present_paths(), vec!["a.txt", "f.txt", "e.txt"]);
        assert_eq!(changes.removed_paths(), vec!["c.txt", "d.txt"]);
    }

    #[test]
    fn test_branch_from_header() {
        assert_eq!(
            branch_from_header("## main...origin/main [ahead 1]\n M a.txt\n"),
            Some("main".to_string())
        );
        assert_eq!(
            branch_from_header("## feature/x\n"),
            Some("feature/x".to_string())
        );
        assert_eq!(
            branch_from_header("## No commits yet on trunk\n"),
            Some("trunk".to_string())
        );
        assert_eq!(branch_from_header("## HEAD (no branch)\n"), None);
        assert_eq!(branch_from_header(" M a.txt\n"), None);
    }
}

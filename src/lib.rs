use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

peg::parser! {
    pub grammar directive() for str {
        rule _ = quiet! { [' ' | '\t' | '\r']* };

        pub rule include() -> Directive<'input>
            = _ "#" _ "include" _ "\"" n:$([^ '"']*) "\"" _ { Directive::Quoted(n) }
            / _ "#" _ "include" _ "<" n:$([^ '>']*) ">" _ { Directive::Angle(n) };
    }
}

/// A source line recognized as an include directive. The name is the raw
/// text between the delimiters, unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    Quoted(&'a str),
    Angle(&'a str),
}

/// Classifies one line. `None` means plain text; the whole line must match
/// one of the two directive forms, leading and trailing whitespace aside.
pub fn classify(line: &str) -> Option<Directive<'_>> {
    directive::include(line).ok()
}

#[derive(Debug, thiserror::Error)]
pub enum InlineError {
    #[error("cannot open source file {}: {}", .path.display(), .source)]
    SourceNotFound { path: PathBuf, source: io::Error },

    #[error("unknown include file {name} at file {from} at line {line}")]
    IncludeUnresolved { name: String, from: String, line: usize },

    #[error("include cycle detected: {} -> {}", .chain.join(" -> "), .path)]
    IncludeCycle { path: String, chain: Vec<String> },

    #[error("cannot open output file {}: {}", .path.display(), .source)]
    DestinationUnwritable { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn check_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = dir.join(name);
    candidate.exists().then_some(candidate)
}

fn find_file(name: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    search_path.iter().find_map(|dir| check_file(dir, name))
}

fn unresolved(name: &str, from: &Path, line: usize) -> InlineError {
    InlineError::IncludeUnresolved {
        name: name.to_string(),
        from: from.display().to_string(),
        line,
    }
}

/// Recursive inliner. Holds the search path, immutable for the whole
/// traversal, and the chain of files currently being expanded.
pub struct Inliner {
    search_path: Vec<PathBuf>,
    chain: Vec<PathBuf>,
}

impl Inliner {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path, chain: Vec::new() }
    }

    /// Flattens `source` into `out`: plain lines verbatim (line ending
    /// normalized to `\n`), directive lines replaced by the fully expanded
    /// contents of the resolved file, depth-first. Any failure in a nested
    /// expansion aborts the whole traversal. Sources must be valid UTF-8;
    /// a file that is not fails with an I/O error.
    pub fn expand<W: Write>(&mut self, source: &Path, out: &mut W) -> Result<(), InlineError> {
        let file = File::open(source).map_err(|e| InlineError::SourceNotFound {
            path: source.to_path_buf(),
            source: e,
        })?;
        let local_dir = source.parent().unwrap_or_else(|| Path::new(""));

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let number = index + 1;
            let resolved = match classify(&line) {
                None => {
                    writeln!(out, "{line}")?;
                    continue;
                },
                // A quoted include tries the including file's own directory
                // before falling back to the search path.
                Some(Directive::Quoted(name)) => check_file(local_dir, name)
                    .or_else(|| find_file(name, &self.search_path))
                    .ok_or_else(|| unresolved(name, source, number))?,
                Some(Directive::Angle(name)) => find_file(name, &self.search_path)
                    .ok_or_else(|| unresolved(name, source, number))?,
            };
            self.descend(&resolved, out)?;
        }

        Ok(())
    }

    fn descend<W: Write>(&mut self, path: &Path, out: &mut W) -> Result<(), InlineError> {
        if self.chain.iter().any(|p| p == path) {
            return Err(InlineError::IncludeCycle {
                path: path.display().to_string(),
                chain: self.chain.iter().map(|p| p.display().to_string()).collect(),
            });
        }

        self.chain.push(path.to_path_buf());
        let result = self.expand(path, out);
        self.chain.pop();
        result
    }
}

/// Flattens `input` into any writer. The input path seeds the in-progress
/// chain, so a file including itself is a cycle rather than unbounded
/// recursion.
pub fn expand<W: Write>(
    input: impl AsRef<Path>,
    out: &mut W,
    search_path: &[PathBuf],
) -> Result<(), InlineError> {
    let input = input.as_ref();
    let mut inliner = Inliner::new(search_path.to_vec());
    inliner.chain.push(input.to_path_buf());
    inliner.expand(input, out)
}

/// Flattens `input` into the file at `output`, truncating it. The input
/// must exist before the output is touched; on failure the output keeps
/// whatever was written before the failing line.
pub fn expand_to_path(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    search_path: &[PathBuf],
) -> Result<(), InlineError> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(InlineError::SourceNotFound {
            path: input.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
    }

    let output = output.as_ref();
    let file = File::create(output).map_err(|e| InlineError::DestinationUnwritable {
        path: output.to_path_buf(),
        source: e,
    })?;
    let mut out = BufWriter::new(file);
    expand(input, &mut out, search_path)?;
    out.flush()?;
    Ok(())
}

//! The built-in command set. Each command is a plain function taking the
//! stage arguments, the previous stage's output, and the tree; the
//! registry is ordered so `help` lists commands in a stable order.

use hashlink::LinkedHashMap;
use regex::RegexBuilder;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::shell::pipeline::{self, PipelineError};
use crate::tree::{GrepOptions, NodeKind, SedOptions, TagTree, TreeError};

type Handler = fn(&[String], &str, &mut TagTree) -> Result<String, ShellError>;

struct Command {
    run: Handler,
    usage: &'static str,
}

/// Runs one command line against the tree, threading output through
/// pipeline stages. Returns the final stage's output.
pub fn run(line: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let stages = pipeline::split(line).context(PipelineSnafu)?;
    let registry = registry();

    let mut output = String::new();
    for stage in stages {
        let (name, args) = stage
            .split_first()
            .context(UnknownCommandSnafu { name: "" })?;
        let command = registry
            .get(name.as_str())
            .context(UnknownCommandSnafu { name: name.clone() })?;
        output = (command.run)(args, &output, tree)?;
    }
    Ok(output)
}

fn registry() -> LinkedHashMap<&'static str, Command> {
    let mut commands = LinkedHashMap::new();
    let mut add = |name, usage, run| {
        commands.insert(name, Command { run, usage });
    };

    add("ls", "ls [-F | --no-classify] [path]", ls as Handler);
    add("cat", "cat [path...]", cat);
    add("grep", "grep [-i] [-v] [-c] [--] <pattern> [path]", grep);
    add("find", "find [path] [-name <regex>] [-type d|f|l]", find);
    add("tree", "tree [path]", tree_cmd);
    add("du", "du [-c | --content] [path]", du);
    add("pwd", "pwd", pwd);
    add("cd", "cd <path>", cd);
    add("echo", "echo [text...]", echo);
    add("mv", "mv <src> <dst>", mv);
    add("cp", "cp <src> <dst>", cp);
    add("rm", "rm [-r | --recursive] <path>...", rm);
    add("mkdir", "mkdir [-p] <path>...", mkdir);
    add("touch", "touch <path> [content...]", touch);
    add("write", "write <path> [content...]", write);
    add("ln", "ln [-s] <target> <link>", ln);
    add("readlink", "readlink <path>", readlink);
    add("sed", "sed [-i] [-r] [-c <count>] <pattern> <replacement> [path]", sed);
    add("info", "info [path]", info);
    add("help", "help", help);
    commands
}

fn usage_error(usage: &'static str) -> ShellError {
    UsageSnafu { usage }.build()
}

fn ls(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let mut classify = true;
    let mut path = ".";
    for arg in args {
        match arg.as_str() {
            "-F" => classify = true,
            "--no-classify" => classify = false,
            p if !p.starts_with('-') => path = p,
            _ => return Err(usage_error("ls [-F | --no-classify] [path]")),
        }
    }
    let names = tree.ls(path, classify, true).context(TreeSnafu)?;
    Ok(names.join("\n"))
}

fn cat(args: &[String], stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    if args.is_empty() {
        return Ok(stdin.to_string());
    }
    let mut pieces = Vec::with_capacity(args.len());
    for path in args {
        pieces.push(tree.cat(path, true).context(TreeSnafu)?);
    }
    Ok(pieces.join("\n"))
}

fn grep(args: &[String], stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    const USAGE: &str = "grep [-i] [-v] [-c] [--] <pattern> [path]";
    // Tree grep matches names and content.
    let mut options = GrepOptions {
        content: true,
        ignore_case: false,
        invert: false,
    };
    let mut count = false;
    let mut positional = Vec::new();
    let mut no_more_flags = false;
    for arg in args {
        match arg.as_str() {
            _ if no_more_flags => positional.push(arg.as_str()),
            "--" => no_more_flags = true,
            "-i" | "--ignore-case" => options.ignore_case = true,
            "-v" | "--invert" => options.invert = true,
            "-c" | "--count" => count = true,
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(usage_error(USAGE));
            }
            word => positional.push(word),
        }
    }
    let (pattern, path) = match positional.as_slice() {
        [pattern] => (*pattern, None),
        [pattern, path] => (*pattern, Some(*path)),
        _ => return Err(usage_error(USAGE)),
    };

    // With piped input and no explicit path, filter the lines instead of
    // walking the tree.
    if path.is_none() && !stdin.is_empty() {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .with_context(|_| BadPatternSnafu { pattern })?;
        let lines: Vec<&str> = stdin
            .lines()
            .filter(|line| regex.is_match(line) != options.invert)
            .collect();
        if count {
            return Ok(lines.len().to_string());
        }
        return Ok(lines.join("\n"));
    }

    let paths = tree
        .grep(pattern, path.unwrap_or("."), &options)
        .context(TreeSnafu)?;
    if count {
        return Ok(paths.len().to_string());
    }
    Ok(paths.join("\n"))
}

fn find(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let mut path = ".";
    let mut name = None;
    let mut kind = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-name" => {
                name = Some(
                    iter.next()
                        .ok_or_else(|| usage_error("find [path] [-name <regex>] [-type d|f|l]"))?
                        .as_str(),
                );
            }
            "-type" => {
                kind = Some(match iter.next().map(String::as_str) {
                    Some("d") => NodeKind::Directory,
                    Some("f") => NodeKind::File,
                    Some("l") => NodeKind::Symlink,
                    _ => return Err(usage_error("find [path] [-name <regex>] [-type d|f|l]")),
                });
            }
            p if !p.starts_with('-') => path = p,
            _ => return Err(usage_error("find [path] [-name <regex>] [-type d|f|l]")),
        }
    }
    let paths = tree.find(path, name, kind).context(TreeSnafu)?;
    Ok(paths.join("\n"))
}

fn tree_cmd(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let path = args.first().map_or(".", String::as_str);
    tree.render(path).context(TreeSnafu)
}

fn du(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let mut content = false;
    let mut path = ".";
    for arg in args {
        match arg.as_str() {
            "-c" | "--content" => content = true,
            p if !p.starts_with('-') => path = p,
            _ => return Err(usage_error("du [-c | --content] [path]")),
        }
    }
    let size = tree.du(path, content).context(TreeSnafu)?;
    Ok(format!("{}\t{}", size, tree.resolve(path)))
}

fn pwd(_args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    Ok(tree.cwd().to_string())
}

fn cd(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let [path] = args else {
        return Err(usage_error("cd <path>"));
    };
    tree.cd(path).context(TreeSnafu)?;
    Ok(String::new())
}

fn echo(args: &[String], _stdin: &str, _tree: &mut TagTree) -> Result<String, ShellError> {
    Ok(args.join(" "))
}

fn mv(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let [src, dst] = args else {
        return Err(usage_error("mv <src> <dst>"));
    };
    tree.mv(src, dst).context(TreeSnafu)?;
    Ok(String::new())
}

fn cp(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let [src, dst] = args else {
        return Err(usage_error("cp <src> <dst>"));
    };
    tree.cp(src, dst).context(TreeSnafu)?;
    Ok(String::new())
}

fn rm(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let mut recursive = false;
    let mut paths = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-r" | "-rf" | "--recursive" => recursive = true,
            p if !p.starts_with('-') => paths.push(p),
            _ => return Err(usage_error("rm [-r | --recursive] <path>...")),
        }
    }
    ensure!(!paths.is_empty(), UsageSnafu { usage: "rm [-r | --recursive] <path>..." });
    for path in paths {
        tree.rm(path, recursive).context(TreeSnafu)?;
    }
    Ok(String::new())
}

fn mkdir(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let mut parents = false;
    let mut paths = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-p" | "--parents" => parents = true,
            p if !p.starts_with('-') => paths.push(p),
            _ => return Err(usage_error("mkdir [-p] <path>...")),
        }
    }
    ensure!(!paths.is_empty(), UsageSnafu { usage: "mkdir [-p] <path>..." });
    for path in paths {
        tree.mkdir(path, parents).context(TreeSnafu)?;
    }
    Ok(String::new())
}

fn touch(args: &[String], stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let (path, rest) = args
        .split_first()
        .ok_or_else(|| usage_error("touch <path> [content...]"))?;
    let content = if rest.is_empty() {
        stdin.trim_end_matches('\n').to_string()
    } else {
        rest.join(" ")
    };
    tree.touch(path, &content).context(TreeSnafu)?;
    Ok(String::new())
}

fn write(args: &[String], stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let (path, rest) = args
        .split_first()
        .ok_or_else(|| usage_error("write <path> [content...]"))?;
    let content = if rest.is_empty() {
        stdin.trim_end_matches('\n').to_string()
    } else {
        rest.join(" ")
    };
    tree.write(path, &content, true).context(TreeSnafu)?;
    Ok(String::new())
}

fn ln(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    // All links here are symbolic; `-s` is accepted for muscle memory.
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|arg| *arg != "-s")
        .collect();
    let [target, link] = positional.as_slice() else {
        return Err(usage_error("ln [-s] <target> <link>"));
    };
    tree.ln(target, link).context(TreeSnafu)?;
    Ok(String::new())
}

fn readlink(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let [path] = args else {
        return Err(usage_error("readlink <path>"));
    };
    tree.readlink(path).context(TreeSnafu)
}

fn sed(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    const USAGE: &str = "sed [-i] [-r] [-c <count>] <pattern> <replacement> [path]";
    let mut options = SedOptions::default();
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-i" | "--ignore-case" => options.ignore_case = true,
            "-r" | "--recursive" => options.recursive = true,
            "-c" | "--count" => {
                options.count = iter
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| usage_error(USAGE))?;
            }
            word => positional.push(word),
        }
    }
    let (pattern, replacement, path) = match positional.as_slice() {
        [pattern, replacement] => (*pattern, *replacement, "."),
        [pattern, replacement, path] => (*pattern, *replacement, *path),
        _ => return Err(usage_error(USAGE)),
    };
    tree.sed(path, pattern, replacement, &options)
        .context(TreeSnafu)?;
    Ok(String::new())
}

fn info(args: &[String], _stdin: &str, tree: &mut TagTree) -> Result<String, ShellError> {
    let path = args.first().map_or(".", String::as_str);
    // Counts reflect the link target; the reported type stays `link`.
    let info = tree.info(path, true).context(TreeSnafu)?;
    let kind = if info.is_link {
        NodeKind::Symlink
    } else {
        info.kind
    };

    let mut out = format!(
        "name: {}\npath: {}\ntype: {}",
        info.name, info.path, kind
    );
    if let Some(target) = &info.link_target {
        out.push_str(&format!("\nlink_target: {target}"));
    }
    out.push_str(&format!(
        "\nchildren: {}\ncontent_length: {}",
        info.children, info.content_length
    ));
    Ok(out)
}

fn help(_args: &[String], _stdin: &str, _tree: &mut TagTree) -> Result<String, ShellError> {
    let lines: Vec<String> = registry()
        .iter()
        .map(|(name, command)| format!("{:<10}{}", name, command.usage))
        .collect();
    Ok(lines.join("\n"))
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShellError {
    #[snafu(display("{source}"))]
    Pipeline { source: PipelineError },
    #[snafu(display("unknown command: {name}"))]
    UnknownCommand { name: String },
    #[snafu(display("usage: {usage}"))]
    Usage { usage: &'static str },
    #[snafu(display("Invalid pattern {pattern:?}: {source}"))]
    BadPattern { pattern: String, source: regex::Error },
    #[snafu(display("{source}"))]
    Tree { source: TreeError },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn seeded() -> TagTree {
        let mut tree = TagTree::new();
        for line in [
            "mkdir -p /animals/cats",
            "write /animals/cats/whiskers curious and fluffy",
            "touch /animals/cats/shadow",
            "mkdir /plants",
            "ln /animals/cats /cats",
        ] {
            run(line, &mut tree).unwrap();
        }
        tree
    }

    #[test]
    fn ls_classifies_by_default() {
        let mut tree = seeded();
        assert_eq!(run("ls /", &mut tree).unwrap(), "animals/\nplants/\ncats@");
        assert_eq!(
            run("ls --no-classify /animals/cats", &mut tree).unwrap(),
            "whiskers\nshadow"
        );
    }

    #[test]
    fn ls_follows_links() {
        let mut tree = seeded();
        assert_eq!(run("ls /cats", &mut tree).unwrap(), "whiskers\nshadow");
    }

    #[test]
    fn cat_reads_through_links() {
        let mut tree = seeded();
        assert_eq!(
            run("cat /cats/whiskers", &mut tree).unwrap(),
            "curious and fluffy"
        );
    }

    #[test]
    fn pipeline_threads_output() {
        let mut tree = seeded();
        assert_eq!(
            run("ls --no-classify /animals/cats | grep sha", &mut tree).unwrap(),
            "shadow"
        );
        assert_eq!(
            run("echo piped content | write /plants/note", &mut tree).unwrap(),
            ""
        );
        assert_eq!(
            run("cat /plants/note", &mut tree).unwrap(),
            "piped content"
        );
    }

    #[test]
    fn grep_searches_content_by_default() {
        let mut tree = seeded();
        let output = run("grep fluffy /", &mut tree).unwrap();
        assert_eq!(output, "/animals/cats/whiskers");
    }

    #[test]
    fn grep_is_case_sensitive_unless_asked() {
        let mut tree = seeded();
        assert_eq!(run("grep FLUFFY /", &mut tree).unwrap(), "");
        assert_eq!(
            run("grep -i FLUFFY /", &mut tree).unwrap(),
            "/animals/cats/whiskers"
        );
    }

    #[test]
    fn grep_count_reports_match_totals() {
        let mut tree = seeded();
        assert_eq!(run("grep -c fluffy /", &mut tree).unwrap(), "1");
        assert_eq!(run("grep -c nothing-here /", &mut tree).unwrap(), "0");
        assert_eq!(
            run("ls --no-classify /animals/cats | grep -c s", &mut tree).unwrap(),
            "2"
        );
    }

    #[test]
    fn grep_invert_filters_stdin() {
        let mut tree = seeded();
        let output = run("ls --no-classify /animals/cats | grep -v whisk", &mut tree).unwrap();
        assert_eq!(output, "shadow");
    }

    #[test]
    fn find_filters_by_type() {
        let mut tree = seeded();
        let output = run("find / -type l", &mut tree).unwrap();
        assert_eq!(output, "/cats");
        let output = run("find / -type d", &mut tree).unwrap();
        assert_eq!(output, "/\n/animals\n/animals/cats\n/plants");
    }

    #[test]
    fn cd_and_pwd_track_the_cwd() {
        let mut tree = seeded();
        assert_eq!(run("pwd", &mut tree).unwrap(), "/");
        run("cd /animals/cats", &mut tree).unwrap();
        assert_eq!(run("pwd", &mut tree).unwrap(), "/animals/cats");
        assert_eq!(run("cat whiskers", &mut tree).unwrap(), "curious and fluffy");
    }

    #[test]
    fn sed_rewrites_content() {
        let mut tree = seeded();
        run("sed -r u U /animals", &mut tree).unwrap();
        assert_eq!(
            run("cat /animals/cats/whiskers", &mut tree).unwrap(),
            "cUrioUs and flUffy"
        );
    }

    #[test]
    fn sed_count_limits_replacements() {
        let mut tree = seeded();
        run("sed -c 1 u U /animals/cats/whiskers", &mut tree).unwrap();
        assert_eq!(
            run("cat /animals/cats/whiskers", &mut tree).unwrap(),
            "cUrious and fluffy"
        );
    }

    #[test]
    fn touch_accepts_content_and_stdin() {
        let mut tree = seeded();
        run("touch /plants/fern soft green fronds", &mut tree).unwrap();
        assert_eq!(
            run("cat /plants/fern", &mut tree).unwrap(),
            "soft green fronds"
        );
        run("echo from the pipe | touch /plants/moss", &mut tree).unwrap();
        assert_eq!(run("cat /plants/moss", &mut tree).unwrap(), "from the pipe");
    }

    #[test]
    fn info_reports_link_target_and_target_counts() {
        let mut tree = seeded();
        let output = run("info /cats", &mut tree).unwrap();
        assert!(output.contains("type: link"));
        assert!(output.contains("link_target: /animals/cats"));
        assert!(output.contains("children: 2"));
    }

    #[test]
    fn readlink_and_rm() {
        let mut tree = seeded();
        assert_eq!(run("readlink /cats", &mut tree).unwrap(), "/animals/cats");
        run("rm /cats", &mut tree).unwrap();
        assert!(run("readlink /cats", &mut tree).is_err());
    }

    #[test]
    fn du_counts_nodes_and_content() {
        let mut tree = seeded();
        assert_eq!(run("du /animals", &mut tree).unwrap(), "4\t/animals");
        assert_eq!(
            run("du -c /animals/cats/whiskers", &mut tree).unwrap(),
            "18\t/animals/cats/whiskers"
        );
    }

    #[test]
    fn help_lists_every_command() {
        let mut tree = TagTree::new();
        let output = run("help", &mut tree).unwrap();
        for name in ["ls", "cat", "grep", "sed", "readlink", "help"] {
            assert!(output.lines().any(|line| line.starts_with(name)));
        }
    }

    #[rstest]
    #[case("frobnicate", "unknown command")]
    #[case("cd", "usage: cd <path>")]
    #[case("mv /only-one", "usage: mv <src> <dst>")]
    #[case("cat /missing", "does not exist")]
    #[case("grep [ /", "Invalid pattern")]
    fn reports_errors(#[case] line: &str, #[case] expected: &str) {
        let mut tree = seeded();
        let error = run(line, &mut tree).unwrap_err();
        assert!(
            error.to_string().contains(expected),
            "{line}: {error}"
        );
    }
}

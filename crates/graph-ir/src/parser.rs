// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Line-oriented parser for the graph description (`main.cnx`).
//!
//! ```text
//! opset 13
//! paths 2
//! initializers 1
//! variables 3            # slots beyond the initializers
//! path 0
//!   output_paths 1
//!   calls 1
//!   call Relu 1 1 0 1 0  # <op> <#out> <#in> <#attr> <ids...>
//!   outputs              # ends the block
//! path 1
//!   input_paths 0
//!   call Identity 1 1 0 2 1
//!   delete 1
//!   outputs
//! start 0
//! stop 1
//! clean 1
//! ```
//!
//! `#` starts a comment. Numbers may be decimal, `0x` hex or `0o` octal.
//! Unknown directives, wrong token counts and malformed numbers are fatal.

use crate::graph::{GraphDef, Parsed};
use crate::{CallDef, CallKind, GraphError, PathDef};
use std::collections::BTreeMap;

/// Parser state: top level, or inside a `path` block.
enum Block {
    TopLevel,
    InPath(PathDef),
}

#[derive(Default)]
struct Header {
    opset: u32,
    path_count: Option<u32>,
    initializers: u32,
    variables: u32,
    start: Vec<u32>,
    stop: Vec<u32>,
    clean: Vec<u32>,
}

/// Parses graph text into an unvalidated [`GraphDef`].
pub fn parse(text: &str) -> Result<GraphDef<Parsed>, GraphError> {
    let mut header = Header::default();
    // Keyed by id; the declared count only bounds ids and sizes nothing.
    let mut paths: BTreeMap<u32, PathDef> = BTreeMap::new();
    let mut block = Block::TopLevel;
    let mut block_start = 0usize;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or_default();
        let tokens: Vec<&str> = content.split_whitespace().collect();
        let Some((&directive, args)) = tokens.split_first() else {
            continue;
        };

        block = match block {
            Block::TopLevel => match directive {
                "path" => {
                    let id = single(line, directive, args)?;
                    let limit = header.path_count.ok_or_else(|| {
                        GraphError::parse(line, "'path' before the 'paths' count")
                    })?;
                    if id >= limit {
                        return Err(GraphError::IdOutOfRange {
                            kind: "path",
                            id,
                            limit,
                            context: format!("line {line}"),
                        });
                    }
                    if paths.contains_key(&id) {
                        return Err(GraphError::parse(line, format!("path {id} defined twice")));
                    }
                    block_start = line;
                    Block::InPath(PathDef::new(id))
                }
                _ => {
                    top_level(line, directive, args, &mut header)?;
                    Block::TopLevel
                }
            },
            Block::InPath(mut path) => match directive {
                "input_paths" => {
                    path.input_paths = numbers(line, args)?;
                    Block::InPath(path)
                }
                "output_paths" => {
                    path.output_paths = numbers(line, args)?;
                    Block::InPath(path)
                }
                "calls" => {
                    path.declared_calls = Some(single(line, directive, args)?);
                    Block::InPath(path)
                }
                "call" => {
                    path.calls.push(parse_call(line, args)?);
                    Block::InPath(path)
                }
                "delete" => {
                    if args.is_empty() {
                        return Err(GraphError::parse(line, "'delete' needs at least one id"));
                    }
                    path.calls.push(CallDef::delete(numbers(line, args)?, line));
                    Block::InPath(path)
                }
                "inputs" => Block::InPath(path),
                "outputs" => {
                    finish_path(&mut paths, path);
                    Block::TopLevel
                }
                other => {
                    return Err(GraphError::parse(
                        line,
                        format!("unsupported directive '{other}' inside path {}", path.id),
                    ))
                }
            },
        };
    }

    if let Block::InPath(path) = block {
        return Err(GraphError::parse(
            block_start,
            format!("path {} is not terminated by 'outputs'", path.id),
        ));
    }

    let paths = (0..header.path_count.unwrap_or(0))
        .map(|id| {
            paths.remove(&id).ok_or_else(|| {
                GraphError::InvalidGraph(format!("path {id} declared but not defined"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let variable_count = header
        .initializers
        .checked_add(header.variables)
        .ok_or_else(|| GraphError::InvalidGraph("variable count overflows u32".into()))?;

    Ok(GraphDef::from_parts(
        header.opset,
        header.initializers,
        variable_count,
        paths,
        header.start,
        header.stop,
        header.clean,
    ))
}

fn top_level(
    line: usize,
    directive: &str,
    args: &[&str],
    header: &mut Header,
) -> Result<(), GraphError> {
    match directive {
        "opset" => header.opset = single(line, directive, args)?,
        "paths" => {
            if header.path_count.is_some() {
                return Err(GraphError::parse(line, "duplicate 'paths' directive"));
            }
            header.path_count = Some(single(line, directive, args)?);
        }
        "initializers" => header.initializers = single(line, directive, args)?,
        "variables" => header.variables = single(line, directive, args)?,
        "start" => header.start = numbers(line, args)?,
        "stop" => header.stop = numbers(line, args)?,
        "clean" => header.clean = numbers(line, args)?,
        other => {
            return Err(GraphError::parse(
                line,
                format!("unsupported directive '{other}'"),
            ))
        }
    }
    Ok(())
}

fn finish_path(paths: &mut BTreeMap<u32, PathDef>, path: PathDef) {
    if let Some(declared) = path.declared_calls {
        let actual = path.op_call_count();
        if declared as usize != actual {
            tracing::warn!(
                path = path.id,
                declared,
                actual,
                "'calls' hint does not match the number of call lines"
            );
        }
    }
    paths.insert(path.id, path);
}

/// `call <opname> <#outputs> <#inputs> <#attributes> <ids...>`
fn parse_call(line: usize, args: &[&str]) -> Result<CallDef, GraphError> {
    if args.len() < 4 {
        return Err(GraphError::parse(
            line,
            format!("'call' expects at least 4 arguments, got {}", args.len()),
        ));
    }
    let name = args[0];
    let outputs = number(line, args[1])? as usize;
    let inputs = number(line, args[2])? as usize;
    let attributes = number(line, args[3])? as usize;

    let ids = numbers(line, &args[4..])?;
    let expected = outputs + inputs + attributes;
    if ids.len() != expected {
        return Err(GraphError::parse(
            line,
            format!(
                "call {name} declares {outputs}+{inputs}+{attributes} ids but lists {}",
                ids.len()
            ),
        ));
    }

    let (out_ids, rest) = ids.split_at(outputs);
    let (in_ids, attr_ids) = rest.split_at(inputs);
    Ok(CallDef {
        kind: CallKind::Op(name.to_string()),
        outputs: out_ids.to_vec(),
        inputs: in_ids.to_vec(),
        attributes: attr_ids.to_vec(),
        line,
    })
}

fn single(line: usize, directive: &str, args: &[&str]) -> Result<u32, GraphError> {
    match args {
        [value] => number(line, value),
        _ => Err(GraphError::parse(
            line,
            format!("'{directive}' expects 1 argument, got {}", args.len()),
        )),
    }
}

fn numbers(line: usize, args: &[&str]) -> Result<Vec<u32>, GraphError> {
    args.iter().map(|a| number(line, a)).collect()
}

/// Decimal, `0x` hexadecimal or `0o` octal.
fn number(line: usize, token: &str) -> Result<u32, GraphError> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(oct) = token.strip_prefix("0o").or_else(|| token.strip_prefix("0O")) {
        u32::from_str_radix(oct, 8)
    } else {
        token.parse()
    };
    parsed.map_err(|e| GraphError::parse(line, format!("invalid number '{token}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PATHS: &str = "\
# two paths, one dependency
opset 13
paths 2
initializers 1
variables 3
path 0
  output_paths 1
  calls 1
  call Relu 1 1 0 1 0
  outputs
path 1
  input_paths 0
  inputs
  calls 1
  call Add 1 2 0 2 1 0
  delete 1
  outputs
start 0
stop 1
clean 1 2
";

    #[test]
    fn test_parse_header() {
        let g = parse(TWO_PATHS).unwrap();
        assert_eq!(g.opset, 13);
        assert_eq!(g.initializer_count, 1);
        assert_eq!(g.variable_count, 4);
        assert_eq!(g.start, vec![0]);
        assert_eq!(g.stop, vec![1]);
        assert_eq!(g.clean, vec![1, 2]);
    }

    #[test]
    fn test_parse_paths_and_calls() {
        let g = parse(TWO_PATHS).unwrap();
        assert_eq!(g.paths.len(), 2);

        let p1 = &g.paths[1];
        assert_eq!(p1.input_paths, vec![0]);
        assert_eq!(p1.calls.len(), 2);
        assert_eq!(p1.calls[0].kind, CallKind::Op("Add".into()));
        assert_eq!(p1.calls[0].outputs, vec![2]);
        assert_eq!(p1.calls[0].inputs, vec![1, 0]);
        assert!(p1.calls[1].kind.is_delete());
        assert_eq!(p1.calls[1].inputs, vec![1]);
    }

    #[test]
    fn test_call_with_too_few_ids() {
        let text = "paths 1\npath 0\ncall Add 1 2 0 2 1\noutputs\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, GraphError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_call_with_too_many_ids() {
        let text = "paths 1\npath 0\ncall Relu 1 1 0 1 0 7\noutputs\n";
        assert!(matches!(parse(text), Err(GraphError::Parse { line: 3, .. })));
    }

    #[test]
    fn test_call_missing_counts() {
        let text = "paths 1\npath 0\ncall Relu 1 1\noutputs\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_unknown_directive() {
        assert!(matches!(
            parse("opset 13\nfrobnicate 1\n"),
            Err(GraphError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse("paths 1\npath 0\n  start 0\noutputs\n"),
            Err(GraphError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_unterminated_path() {
        let err = parse("paths 1\npath 0\ncall Relu 1 1 0 1 0\n").unwrap_err();
        assert!(matches!(err, GraphError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_undefined_path() {
        let err = parse("paths 2\npath 0\noutputs\n").unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn test_huge_path_count_is_a_load_error() {
        let err = parse("paths 4294967295\n").unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(ref m) if m.contains("path 0")), "{err}");

        let err = parse("paths 0xffffffff\npath 4294967294\noutputs\n").unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)), "{err}");
    }

    #[test]
    fn test_path_id_out_of_range() {
        let err = parse("paths 1\npath 1\noutputs\n").unwrap_err();
        assert!(matches!(err, GraphError::IdOutOfRange { kind: "path", id: 1, .. }));
    }

    #[test]
    fn test_path_defined_twice() {
        assert!(parse("paths 1\npath 0\noutputs\npath 0\noutputs\n").is_err());
    }

    #[test]
    fn test_number_radixes() {
        let g = parse("opset 0x0d\ninitializers 0o10\nvariables 2\n").unwrap();
        assert_eq!(g.opset, 13);
        assert_eq!(g.initializer_count, 8);
        assert_eq!(g.variable_count, 10);
        assert!(parse("opset thirteen\n").is_err());
        assert!(parse("opset -1\n").is_err());
    }

    #[test]
    fn test_arity_of_scalar_directives() {
        assert!(parse("opset\n").is_err());
        assert!(parse("variables 1 2\n").is_err());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let g = parse("\n   # nothing here\n\topset 7 # trailing\n\n").unwrap();
        assert_eq!(g.opset, 7);
        assert!(g.paths.is_empty());
    }

    #[test]
    fn test_empty_endpoint_lists() {
        let g = parse("start\nstop\nclean\n").unwrap();
        assert!(g.start.is_empty() && g.stop.is_empty() && g.clean.is_empty());
    }
}

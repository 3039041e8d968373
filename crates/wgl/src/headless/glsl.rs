use std::collections::{HashMap, HashSet};

use crate::gl::constants;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub type_name: String,
    pub name: String,
    pub array_len: Option<u32>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ParsedShader {
    pub uniforms: Vec<Declaration>,
    pub attributes: Vec<Declaration>,
    pub structs: HashMap<String, Vec<Declaration>>,
    pub referenced: HashSet<String>,
}

pub(crate) fn gl_type_for(type_name: &str) -> Option<u32> {
    let ty = match type_name {
        "bool" => constants::BOOL,
        "int" => constants::INT,
        "float" => constants::FLOAT,
        "bvec2" => constants::BOOL_VEC2,
        "bvec3" => constants::BOOL_VEC3,
        "bvec4" => constants::BOOL_VEC4,
        "ivec2" => constants::INT_VEC2,
        "ivec3" => constants::INT_VEC3,
        "ivec4" => constants::INT_VEC4,
        "vec2" => constants::FLOAT_VEC2,
        "vec3" => constants::FLOAT_VEC3,
        "vec4" => constants::FLOAT_VEC4,
        "mat2" => constants::FLOAT_MAT2,
        "mat3" => constants::FLOAT_MAT3,
        "mat4" => constants::FLOAT_MAT4,
        "sampler2D" => constants::SAMPLER_2D,
        "samplerCube" => constants::SAMPLER_CUBE,
        _ => return None,
    };
    Some(ty)
}

pub(crate) fn components(gl_type: u32) -> usize {
    match gl_type {
        constants::FLOAT_VEC2 | constants::INT_VEC2 | constants::BOOL_VEC2 => 2,
        constants::FLOAT_VEC3 | constants::INT_VEC3 | constants::BOOL_VEC3 => 3,
        constants::FLOAT_VEC4 | constants::INT_VEC4 | constants::BOOL_VEC4 => 4,
        constants::FLOAT_MAT2 => 4,
        constants::FLOAT_MAT3 => 9,
        constants::FLOAT_MAT4 => 16,
        _ => 1,
    }
}

pub(crate) fn is_integer(gl_type: u32) -> bool {
    matches!(
        gl_type,
        constants::BOOL
            | constants::BOOL_VEC2
            | constants::BOOL_VEC3
            | constants::BOOL_VEC4
            | constants::INT
            | constants::INT_VEC2
            | constants::INT_VEC3
            | constants::INT_VEC4
            | constants::SAMPLER_2D
            | constants::SAMPLER_CUBE
    )
}

/// Validates a shader the way a strict driver would for the constructs we
/// emulate. Returns the info log on failure.
pub(crate) fn check_compile(source: &str) -> Result<(), String> {
    let stripped = strip_comments(source);
    let line_count = stripped.lines().count().max(1);

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(message) = trimmed.strip_prefix("#error") {
            return Err(format!(
                "ERROR: 0:{}: '#error' : {}",
                index + 1,
                message.trim()
            ));
        }
    }

    let mut depth: i64 = 0;
    for (index, line) in stripped.lines().enumerate() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("ERROR: 0:{}: '}}' : syntax error", index + 1));
                    }
                }
                _ => {}
            }
        }
    }
    if depth > 0 {
        return Err(format!(
            "ERROR: 0:{line_count}: '' : syntax error: unexpected end of file"
        ));
    }

    let tokens = identifiers_in_order(&stripped);
    let has_main = tokens
        .windows(2)
        .any(|pair| pair[0] == "void" && pair[1] == "main");
    if !has_main {
        return Err(format!(
            "ERROR: 0:{line_count}: 'main' : function not defined"
        ));
    }
    Ok(())
}

/// Scans declarations and function bodies of a shader that passed
/// [`check_compile`].
pub(crate) fn parse(source: &str, kind: u32) -> ParsedShader {
    let stripped = strip_preprocessor(&strip_comments(source));
    let mut parsed = ParsedShader::default();
    let mut statement = String::new();
    let mut chars = stripped.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ';' => {
                handle_statement(&statement, kind, &mut parsed);
                statement.clear();
            }
            '{' => {
                let mut block = String::new();
                let mut depth = 1;
                for inner in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    block.push(inner);
                }
                let header = statement.trim().to_string();
                statement.clear();
                if let Some(struct_name) = header.strip_prefix("struct") {
                    let members = block.split(';').flat_map(parse_declarators).collect();
                    parsed
                        .structs
                        .insert(struct_name.trim().to_string(), members);
                    // Skip the declarator list / terminating semicolon.
                    for rest in chars.by_ref() {
                        if rest == ';' {
                            break;
                        }
                    }
                } else {
                    parsed.referenced.extend(identifiers_in_order(&block));
                }
            }
            _ => statement.push(ch),
        }
    }
    parsed
}

fn handle_statement(statement: &str, kind: u32, parsed: &mut ParsedShader) {
    let mut text = statement.trim();
    if text.starts_with("layout") {
        if let Some(close) = text.find(')') {
            text = text[close + 1..].trim_start();
        }
    }
    let Some((qualifier, rest)) = text.split_once(char::is_whitespace) else {
        return;
    };
    match qualifier {
        "uniform" => parsed.uniforms.extend(parse_declarators(rest)),
        "attribute" => parsed.attributes.extend(parse_declarators(rest)),
        "in" if kind == constants::VERTEX_SHADER => {
            parsed.attributes.extend(parse_declarators(rest))
        }
        _ => {}
    }
}

fn parse_declarators(text: &str) -> Vec<Declaration> {
    let mut words = text
        .split_whitespace()
        .filter(|word| !matches!(*word, "lowp" | "mediump" | "highp" | "const"))
        .peekable();
    let Some(type_name) = words.next() else {
        return Vec::new();
    };
    let remainder: Vec<&str> = words.collect();
    let remainder = remainder.join(" ");

    remainder
        .split(',')
        .filter_map(|declarator| {
            let declarator = declarator.split('=').next().unwrap_or_default().trim();
            if declarator.is_empty() {
                return None;
            }
            let (name, array_len) = match declarator.split_once('[') {
                Some((name, rest)) => {
                    let len = rest
                        .trim_end_matches(']')
                        .trim()
                        .parse::<u32>()
                        .unwrap_or(1);
                    (name.trim(), Some(len))
                }
                None => (declarator, None),
            };
            if name.is_empty() || !name.chars().all(is_ident_char) {
                return None;
            }
            Some(Declaration {
                type_name: type_name.to_string(),
                name: name.to_string(),
                array_len,
            })
        })
        .collect()
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn identifiers_in_order(text: &str) -> Vec<String> {
    text.split(|ch: char| !is_ident_char(ch))
        .filter(|token| {
            !token.is_empty() && !token.starts_with(|ch: char| ch.is_ascii_digit())
        })
        .map(str::to_string)
        .collect()
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '/' {
            match chars.peek() {
                Some('/') => {
                    for inner in chars.by_ref() {
                        if inner == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut previous = '\0';
                    for inner in chars.by_ref() {
                        if inner == '\n' {
                            out.push('\n');
                        }
                        if previous == '*' && inner == '/' {
                            break;
                        }
                        previous = inner;
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
    }
    out
}

fn strip_preprocessor(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

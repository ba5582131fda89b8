//! File-backed [`SceneRuntime`] over Maya ASCII (`.ma`) scenes.
//!
//! The scene is kept as its list of top-level statements, byte for byte.
//! A statement starts on a line with no leading whitespace and owns every
//! indented line after it (`createNode` followed by its `setAttr` lines, for
//! example). Saving concatenates the statements back, so anything that was
//! not deleted is written out unchanged.
//!
//! Scenes written in a legacy codeset (`//Codeset: 936`, cp1252, ...) are not
//! valid UTF-8. Those are decoded one byte per char and encoded back the same
//! way on save, so bytes outside the edited statements round-trip unchanged.
//!
//! Script jobs only exist inside a live Maya session; this runtime never has
//! any. Binary `.mb` scenes cannot be opened.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;

use crate::core::types::SCRIPT_NODE_TYPE;
use crate::io::fs::write_atomic;
use crate::io::runtime::SceneRuntime;

const MAYA_ASCII_HEADER: &str = "//Maya ASCII";

/// Long/short names of the attributes every script node carries.
const SCRIPT_ATTRS: &[(&str, &str)] = &[
    ("before", "b"),
    ("after", "a"),
    ("scriptType", "st"),
    ("sourceType", "stp"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    Semi,
}

/// How the scene text maps back to bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    /// One char per byte (`U+0000..=U+00FF`).
    Bytes,
}

impl Encoding {
    fn decode(raw: Vec<u8>) -> (String, Self) {
        match String::from_utf8(raw) {
            Ok(text) => (text, Encoding::Utf8),
            Err(err) => {
                let text = err.into_bytes().into_iter().map(char::from).collect();
                (text, Encoding::Bytes)
            }
        }
    }

    fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Bytes => text
                .chars()
                .map(|c| {
                    u8::try_from(c)
                        .map_err(|_| anyhow!("{c:?} does not fit the scene's single-byte text"))
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
struct AsciiScene {
    path: PathBuf,
    statements: Vec<String>,
    encoding: Encoding,
    modified: bool,
}

impl AsciiScene {
    fn parse(path: &Path, text: &str, encoding: Encoding) -> Result<Self> {
        if !text.starts_with(MAYA_ASCII_HEADER) {
            bail!(
                "{} is not a Maya ASCII scene (binary scenes need a live Maya session)",
                path.display()
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            statements: split_statements(text),
            encoding,
            modified: false,
        })
    }

    fn nodes(&self) -> impl Iterator<Item = (usize, CreatedNode)> + '_ {
        self.statements
            .iter()
            .enumerate()
            .filter_map(|(idx, stmt)| created_node(stmt).map(|node| (idx, node)))
    }

    fn find(&self, name: &str) -> Result<(usize, CreatedNode)> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .ok_or_else(|| anyhow!("no node named {name:?} in {}", self.path.display()))
    }

    fn render(&self) -> String {
        self.statements.concat()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CreatedNode {
    node_type: String,
    name: String,
}

/// Maya ASCII runtime. Holds at most one open scene.
#[derive(Debug, Default)]
pub struct AsciiSceneRuntime {
    scene: Option<AsciiScene>,
    user_script_dir: Option<PathBuf>,
}

impl AsciiSceneRuntime {
    /// Runtime whose user script dir is `$MAYA_APP_DIR/scripts` when present.
    pub fn new() -> Self {
        let dir = env::var_os("MAYA_APP_DIR")
            .map(|dir| PathBuf::from(dir).join("scripts"))
            .filter(|dir| dir.is_dir());
        Self::with_user_script_dir(dir)
    }

    pub fn with_user_script_dir(user_script_dir: Option<PathBuf>) -> Self {
        Self {
            scene: None,
            user_script_dir,
        }
    }

    fn scene(&self) -> Result<&AsciiScene> {
        self.scene.as_ref().ok_or_else(|| anyhow!("no scene is open"))
    }

    fn scene_mut(&mut self) -> Result<&mut AsciiScene> {
        self.scene.as_mut().ok_or_else(|| anyhow!("no scene is open"))
    }
}

impl SceneRuntime for AsciiSceneRuntime {
    fn current_scene(&self) -> Result<Option<PathBuf>> {
        Ok(self.scene.as_ref().map(|scene| scene.path.clone()))
    }

    fn is_modified(&self) -> Result<bool> {
        Ok(self.scene.as_ref().is_some_and(|scene| scene.modified))
    }

    fn save_scene(&mut self) -> Result<()> {
        let scene = self.scene_mut()?;
        let bytes = scene.encoding.encode(&scene.render())?;
        write_atomic(&scene.path, &bytes)?;
        scene.modified = false;
        debug!(path = %scene.path.display(), "scene saved");
        Ok(())
    }

    fn new_scene(&mut self) -> Result<()> {
        self.scene = None;
        Ok(())
    }

    fn open_scene(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path).with_context(|| format!("read scene {}", path.display()))?;
        let (text, encoding) = Encoding::decode(bytes);
        let scene = AsciiScene::parse(path, &text, encoding)?;
        debug!(
            path = %path.display(),
            statements = scene.statements.len(),
            ?encoding,
            "scene opened"
        );
        self.scene = Some(scene);
        Ok(())
    }

    fn list_nodes(&self, node_type: &str) -> Result<Vec<String>> {
        let Some(scene) = self.scene.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(scene
            .nodes()
            .filter(|(_, node)| node.node_type == node_type)
            .map(|(_, node)| node.name)
            .collect())
    }

    fn node_exists(&self, node: &str) -> Result<bool> {
        Ok(self.scene()?.nodes().any(|(_, created)| created.name == node))
    }

    fn has_attribute(&self, node: &str, attr: &str) -> Result<bool> {
        let scene = self.scene()?;
        let (idx, created) = scene.find(node)?;
        if created.node_type == SCRIPT_NODE_TYPE
            && SCRIPT_ATTRS
                .iter()
                .any(|(long, short)| attr == *long || attr == *short)
        {
            return Ok(true);
        }
        Ok(find_set_attr(&scene.statements[idx], attr).is_some())
    }

    fn string_attribute(&self, node: &str, attr: &str) -> Result<Option<String>> {
        let scene = self.scene()?;
        let (idx, _) = scene.find(node)?;
        Ok(find_set_attr(&scene.statements[idx], attr).and_then(|tokens| string_value(&tokens)))
    }

    fn delete_node(&mut self, node: &str) -> Result<()> {
        let scene = self.scene_mut()?;
        let (idx, _) = scene.find(node)?;
        scene.statements.remove(idx);
        scene
            .statements
            .retain(|stmt| !is_connection_to(stmt, node));
        scene.modified = true;
        debug!(node, "node deleted");
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn kill_job(&mut self, id: u32) -> Result<()> {
        bail!("script job {id} not found: file-backed scenes have no running jobs")
    }

    fn user_script_dir(&self) -> Option<PathBuf> {
        self.user_script_dir.clone()
    }
}

fn split_statements(text: &str) -> Vec<String> {
    let mut statements: Vec<String> = Vec::new();
    for line in text.split_inclusive('\n') {
        if line.starts_with([' ', '\t']) {
            if let Some(current) = statements.last_mut() {
                current.push_str(line);
                continue;
            }
        }
        statements.push(line.to_string());
    }
    statements
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == ';' {
            chars.next();
            tokens.push(Token::Semi);
        } else if c == '"' {
            chars.next();
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => match chars.next() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some(other) => value.push(other),
                        None => {}
                    },
                    other => value.push(other),
                }
            }
            tokens.push(Token::Str(value));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == ';' || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    tokens
}

/// Split a statement's tokens into `;`-terminated commands.
fn commands(stmt: &str) -> Vec<Vec<Token>> {
    tokenize(stmt)
        .split(|token| *token == Token::Semi)
        .filter(|cmd| !cmd.is_empty())
        .map(<[Token]>::to_vec)
        .collect()
}

fn created_node(stmt: &str) -> Option<CreatedNode> {
    if !stmt.starts_with("createNode") {
        return None;
    }
    let first = commands(stmt).into_iter().next()?;
    let mut tokens = first.iter();
    if tokens.next() != Some(&Token::Word("createNode".to_string())) {
        return None;
    }
    let node_type = match tokens.next()? {
        Token::Word(word) => word.clone(),
        _ => return None,
    };
    while let Some(token) = tokens.next() {
        if matches!(token, Token::Word(flag) if flag == "-n" || flag == "-name") {
            let name = match tokens.next()? {
                Token::Word(name) | Token::Str(name) => name.clone(),
                Token::Semi => return None,
            };
            return Some(CreatedNode { node_type, name });
        }
    }
    None
}

/// Tokens of the `setAttr` command in `stmt` that targets `attr`.
fn find_set_attr(stmt: &str, attr: &str) -> Option<Vec<Token>> {
    let names: Vec<&str> = SCRIPT_ATTRS
        .iter()
        .find(|(long, short)| attr == *long || attr == *short)
        .map(|(long, short)| vec![*long, *short])
        .unwrap_or_else(|| vec![attr]);

    commands(stmt).into_iter().skip(1).find(|cmd| {
        cmd.first() == Some(&Token::Word("setAttr".to_string()))
            && cmd.iter().any(|token| {
                matches!(token, Token::Str(plug)
                    if plug.strip_prefix('.').is_some_and(|name| names.contains(&name)))
            })
    })
}

/// Concatenated string literals following `-type "string"`.
fn string_value(cmd: &[Token]) -> Option<String> {
    let type_at = cmd.windows(2).position(|pair| {
        pair[0] == Token::Word("-type".to_string()) && pair[1] == Token::Str("string".to_string())
    })?;
    Some(
        cmd[type_at + 2..]
            .iter()
            .filter_map(|token| match token {
                Token::Str(part) => Some(part.as_str()),
                _ => None,
            })
            .collect(),
    )
}

fn is_connection_to(stmt: &str, node: &str) -> bool {
    if !(stmt.starts_with("connectAttr") || stmt.starts_with("disconnectAttr")) {
        return false;
    }
    tokenize(stmt).iter().any(|token| match token {
        Token::Str(plug) => plug_node(plug) == node,
        _ => false,
    })
}

fn plug_node(plug: &str) -> &str {
    let plug = plug.trim_start_matches(':');
    plug.split_once('.').map_or(plug, |(node, _)| node)
}

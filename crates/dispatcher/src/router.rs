//! 路由表与解析
//!
//! 路径模式支持字面量段、参数段（`:id` 或 `{id}`）以及末尾的通配段（`*rest` 或 `{*rest}`）。
//! 匹配优先级：不含通配 > 字面量段更多 > 段数更多 > 注册顺序。

use std::collections::HashMap;

use gateway_core::{DispatchError, GatewayResult};
use gateway_domain::{ResolvedRoute, Route};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("路由重复: {method} {pattern}")]
    Duplicate { method: String, pattern: String },

    #[error("路径模式 {pattern} 无效: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, RouterError> {
        let invalid = |reason: &str| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let inner = raw
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'));
        let segment = match inner {
            Some(name) => match name.strip_prefix('*') {
                Some(rest) => Segment::Wildcard(rest.to_string()),
                None => Segment::Param(name.to_string()),
            },
            None => {
                if let Some(name) = raw.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else if let Some(rest) = raw.strip_prefix('*') {
                    Segment::Wildcard(rest.to_string())
                } else {
                    Segment::Literal(raw.to_string())
                }
            }
        };

        match &segment {
            Segment::Param(name) | Segment::Wildcard(name) if name.is_empty() => {
                Err(invalid("参数名不能为空"))
            }
            _ => Ok(segment),
        }
    }

    /// 用于判重的形状，参数名不同的模式视为同一形状
    fn shape(&self) -> &str {
        match self {
            Segment::Literal(value) => value,
            Segment::Param(_) => ":",
            Segment::Wildcard(_) => "*",
        }
    }
}

#[derive(Debug)]
struct CompiledRoute {
    route: Route,
    segments: Vec<Segment>,
}

impl CompiledRoute {
    fn compile(route: Route) -> Result<Self, RouterError> {
        let segments = split_path(&route.pattern)
            .map(|raw| Segment::parse(raw, &route.pattern))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(pos) = segments
            .iter()
            .position(|s| matches!(s, Segment::Wildcard(_)))
        {
            if pos + 1 != segments.len() {
                return Err(RouterError::InvalidPattern {
                    pattern: route.pattern.clone(),
                    reason: "通配段只能出现在末尾".to_string(),
                });
            }
        }

        Ok(Self { route, segments })
    }

    fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// 排序键，越大越优先
    fn specificity(&self) -> (bool, usize, usize) {
        (!self.has_wildcard(), self.literal_count(), self.segments.len())
    }

    fn shape(&self) -> Vec<&str> {
        self.segments.iter().map(Segment::shape).collect()
    }

    fn matches(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard(name) => {
                    params.insert(name.clone(), path[i.min(path.len())..].join("/"));
                    return Some(params);
                }
                Segment::Literal(expected) => {
                    if path.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = path.get(i)?;
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }
        (path.len() == self.segments.len()).then_some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// 不可变的路由表
#[derive(Debug)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn build(routes: Vec<Route>) -> Result<Self, RouterError> {
        let mut compiled: Vec<CompiledRoute> = Vec::with_capacity(routes.len());
        for route in routes {
            let candidate = CompiledRoute::compile(route)?;
            let duplicate = compiled.iter().any(|existing| {
                existing.route.method == candidate.route.method
                    && existing.shape() == candidate.shape()
            });
            if duplicate {
                return Err(RouterError::Duplicate {
                    method: candidate.route.method.to_string(),
                    pattern: candidate.route.pattern,
                });
            }
            compiled.push(candidate);
        }

        // 稳定排序，同等优先级保持注册顺序
        compiled.sort_by(|a, b| b.specificity().cmp(&a.specificity()));

        Ok(Self { routes: compiled })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 解析 (方法, 路径)
    ///
    /// 路径无任何模式匹配时返回 `NotFound`；路径匹配但方法不匹配时返回
    /// `MethodNotAllowed`，并附带该路径允许的方法。
    pub fn resolve(&self, method: &str, path: &str) -> GatewayResult<ResolvedRoute> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut allowed: Vec<String> = Vec::new();

        for compiled in &self.routes {
            let Some(path_params) = compiled.matches(&segments) else {
                continue;
            };
            if compiled.route.method.as_str().eq_ignore_ascii_case(method) {
                return Ok(ResolvedRoute {
                    route: compiled.route.clone(),
                    path_params,
                });
            }
            let name = compiled.route.method.to_string();
            if !allowed.contains(&name) {
                allowed.push(name);
            }
        }

        if allowed.is_empty() {
            Err(DispatchError::NotFound {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(DispatchError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allowed,
            })
        }
    }
}

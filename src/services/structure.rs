//! # 코드 구조 요약
//!
//! 저장소 README 같은 코드 관련 텍스트에서 생성 모델 없이 구조 요약을 뽑아냅니다.
//! 결과는 합성 프롬프트의 추가 맥락으로 쓰이고, 분석 결과(`AnalysisResult::structure`)에도 담깁니다.
//!
//! ## 처리 순서
//! 1. 텍스트를 약 1,000자 단위 청크로 나눔 (단어 경계 유지)
//! 2. `class Foo`, `def bar` 같은 선언 키워드 뒤의 식별자를 엔티티로 추출
//! 3. 같은 청크에 함께 등장한 엔티티 쌍을 의존 관계(간선)로 기록
//! 4. 그래프에서 핵심 컴포넌트(연결 수), 핵심 함수(이름 키워드), 실행 흐름(위상 정렬)을 계산
//!
//! 모든 동점은 "처음 등장한 순서"로 깹니다. 같은 입력이면 항상 같은 결과가 나옵니다.

use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use crate::models::CodeStructure;

/// 청크 하나의 목표 길이
pub const CHUNK_CHARS: usize = 1_000;

const MAX_COMPONENTS: usize = 5;
const MAX_FUNCTIONS: usize = 5;
const MAX_FLOW_STEPS: usize = 8;
/// 순환이 있어 위상 정렬이 불가능할 때 사용할 엔티티 수
const CYCLIC_FLOW_ENTITIES: usize = 10;

const FUNCTION_KEYWORDS: [&str; 9] = [
    "handler", "process", "create", "update", "delete", "fetch", "get", "post", "put",
];

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:class|function|def|const|let|var|interface|type|component|api|endpoint|service|module)\s+(\w+)",
    )
    .expect("valid entity regex")
});

/// 텍스트 → 구조 요약
pub fn analyze(text: &str) -> CodeStructure {
    let chunks = chunk_words(text, CHUNK_CHARS);
    let graph = EntityGraph::build(&chunks);
    tracing::debug!(
        "code structure graph built (chunks={}, nodes={}, edges={})",
        chunks.len(),
        graph.nodes.len(),
        graph.edge_count()
    );

    if graph.nodes.is_empty() {
        return CodeStructure {
            key_components: to_strings(&["core system", "input handler", "output formatter"]),
            key_functions: to_strings(&["main", "init", "run"]),
            execution_flow: to_strings(&["System initializes", "Processes input", "Returns output"]),
        };
    }

    CodeStructure {
        key_components: graph.key_components(),
        key_functions: graph.key_functions(),
        execution_flow: graph.execution_flow(),
    }
}

/// 단어를 이어 붙여 `max_chars` 안팎의 청크를 만듭니다.
///
/// 한 단어가 `max_chars`보다 길면 그 단어 하나가 청크가 됩니다.
pub fn chunk_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if current_chars > 0 && current_chars + 1 + word_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// 엔티티 동시 등장 그래프
///
/// 노드는 처음 등장한 순서로 인덱스를 가지며, 간선은 (from, to) 인덱스 쌍입니다.
#[derive(Debug, Default)]
struct EntityGraph {
    nodes: Vec<String>,
    edges: BTreeSet<(usize, usize)>,
}

impl EntityGraph {
    fn build(chunks: &[String]) -> Self {
        let mut nodes: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for chunk in chunks {
            for caps in ENTITY_RE.captures_iter(chunk) {
                let Some(name) = caps.get(1) else { continue };
                let name = name.as_str();
                if seen.insert(name.to_string()) {
                    nodes.push(name.to_string());
                }
            }
        }

        let lowered: Vec<String> = nodes.iter().map(|n| n.to_lowercase()).collect();
        let mut edges = BTreeSet::new();
        for chunk in chunks {
            let chunk_lower = chunk.to_lowercase();
            let present: Vec<usize> = lowered
                .iter()
                .enumerate()
                .filter(|(_, name)| chunk_lower.contains(name.as_str()))
                .map(|(index, _)| index)
                .collect();
            for (i, &from) in present.iter().enumerate() {
                for &to in &present[i + 1..] {
                    edges.insert((from, to));
                }
            }
        }

        Self { nodes, edges }
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 연결된 서로 다른 이웃 수(들어오는 + 나가는) 상위 5개
    fn key_components(&self) -> Vec<String> {
        let mut neighbours: HashMap<usize, HashSet<usize>> = HashMap::new();
        for &(from, to) in &self.edges {
            neighbours.entry(from).or_default().insert(to);
            neighbours.entry(to).or_default().insert(from);
        }

        let mut ranked: Vec<(usize, usize)> = (0..self.nodes.len())
            .map(|index| (index, neighbours.get(&index).map_or(0, HashSet::len)))
            .collect();
        // 안정 정렬이므로 동점은 처음 등장한 순서를 유지합니다.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        ranked
            .into_iter()
            .take(MAX_COMPONENTS)
            .map(|(index, _)| self.nodes[index].clone())
            .collect()
    }

    fn key_functions(&self) -> Vec<String> {
        let matching: Vec<String> = self
            .nodes
            .iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                FUNCTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
            })
            .take(MAX_FUNCTIONS)
            .cloned()
            .collect();

        if matching.is_empty() {
            self.nodes.iter().take(MAX_FUNCTIONS).cloned().collect()
        } else {
            matching
        }
    }

    fn execution_flow(&self) -> Vec<String> {
        let order = self.topological_order().unwrap_or_else(|| {
            (0..self.nodes.len().min(CYCLIC_FLOW_ENTITIES)).collect()
        });
        let last = order.len().saturating_sub(1);

        order
            .iter()
            .take(MAX_FLOW_STEPS)
            .enumerate()
            .map(|(position, &index)| {
                let name = &self.nodes[index];
                if position == 0 {
                    format!("Initialize {}", name)
                } else if position == last {
                    format!("Return result from {}", name)
                } else {
                    format!("Process {}", name)
                }
            })
            .collect()
    }

    /// Kahn 알고리즘: 진입 차수 0인 노드 중 가장 먼저 등장한 것부터 꺼냅니다.
    /// 순환이 있으면 None.
    fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for &(from, to) in &self.edges {
            in_degree[to] += 1;
            outgoing[from].push(to);
        }

        let mut ready: BTreeSet<usize> = (0..self.nodes.len())
            .filter(|&index| in_degree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &next in &outgoing[index] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunks_respect_word_boundaries() {
        let chunks = chunk_words("alpha beta gamma delta", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
        assert!(chunk_words("   ", 10).is_empty());
    }

    #[test]
    fn empty_text_uses_generic_structure() {
        let structure = analyze("Just a plain sentence with no declarations.");
        assert_eq!(
            structure.execution_flow,
            vec!["System initializes", "Processes input", "Returns output"]
        );
        assert_eq!(
            structure.key_components,
            vec!["core system", "input handler", "output formatter"]
        );
        assert_eq!(structure.key_functions, vec!["main", "init", "run"]);
    }

    #[test]
    fn extracts_entities_and_ranks_by_connections() {
        let text = "class Router routes requests. def process_request uses Router. \
                    service Store persists data for process_request and Router.";
        let structure = analyze(text);

        // 모두 한 청크에 있으므로 세 엔티티가 서로 연결됩니다.
        assert_eq!(
            structure.key_components,
            vec!["Router", "process_request", "Store"]
        );
        assert_eq!(structure.key_functions, vec!["process_request"]);
        assert_eq!(
            structure.execution_flow,
            vec![
                "Initialize Router",
                "Process process_request",
                "Return result from Store"
            ]
        );
    }

    #[test]
    fn key_functions_fall_back_to_first_entities() {
        let structure = analyze("class Alpha and class Beta");
        assert_eq!(structure.key_functions, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn declaration_keywords_are_case_insensitive() {
        let structure = analyze("CLASS Engine drives Module Wheels");
        assert_eq!(structure.key_functions, vec!["Engine", "Wheels"]);
    }

    #[test]
    fn flow_is_capped_at_eight_steps() {
        let text: String = (0..12).map(|i| format!("def step{} ", i)).collect();
        let structure = analyze(&text);
        assert_eq!(structure.execution_flow.len(), 8);
        assert_eq!(structure.execution_flow[0], "Initialize step0");
        // 전체 순서의 마지막(step11)은 8개 안에 없으므로 "Return result"가 나오지 않습니다.
        assert!(structure
            .execution_flow
            .iter()
            .all(|line| !line.starts_with("Return result")));
    }
}

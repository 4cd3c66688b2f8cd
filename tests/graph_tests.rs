use std::collections::HashSet;
use taskwave::{GraphError, Task, TaskGraph};

fn done(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn test_valid_diamond_graph() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p"),
        Task::new("b", "agent", "p").depends_on("a"),
        Task::new("c", "agent", "p").depends_on("a"),
        Task::new("d", "agent", "p").depends_on("b").depends_on("c"),
    ]);
    assert!(graph.validate().is_ok());
    assert_eq!(graph.len(), 4);
    assert!(!graph.is_empty());
}

#[test]
fn test_duplicate_id_rejected() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p"),
        Task::new("a", "agent", "p"),
    ]);
    assert_eq!(
        graph.validate(),
        Err(GraphError::DuplicateId("a".to_string()))
    );
}

#[test]
fn test_empty_id_rejected() {
    let graph = TaskGraph::new(vec![Task::new("", "agent", "p")]);
    assert_eq!(graph.validate(), Err(GraphError::EmptyId));
}

#[test]
fn test_dangling_dependency_rejected() {
    let graph = TaskGraph::new(vec![Task::new("a", "agent", "p").depends_on("ghost")]);
    match graph.validate() {
        Err(GraphError::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "a");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("expected UnknownDependency, got {:?}", other),
    }
}

#[test]
fn test_self_reference_rejected() {
    let graph = TaskGraph::new(vec![Task::new("a", "agent", "p").depends_on("a")]);
    assert_eq!(
        graph.validate(),
        Err(GraphError::SelfReference("a".to_string()))
    );
}

#[test]
fn test_two_node_cycle_rejected() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p").depends_on("b"),
        Task::new("b", "agent", "p").depends_on("a"),
    ]);
    let error = graph.validate().unwrap_err();
    assert!(matches!(error, GraphError::Cycle(_)));
    assert!(error.to_string().starts_with("cycle: "));
}

#[test]
fn test_long_cycle_rejected_behind_valid_prefix() {
    let graph = TaskGraph::new(vec![
        Task::new("root", "agent", "p"),
        Task::new("a", "agent", "p").depends_on("root").depends_on("c"),
        Task::new("b", "agent", "p").depends_on("a"),
        Task::new("c", "agent", "p").depends_on("b"),
    ]);
    match graph.validate() {
        Err(GraphError::Cycle(path)) => {
            assert_eq!(path.first(), path.last());
            // a, b, c plus the repeated closing node.
            assert_eq!(path.len(), 4);
        }
        other => panic!("expected Cycle, got {:?}", other),
    }
}

#[test]
fn test_ready_ids_roots_first() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p"),
        Task::new("b", "agent", "p").depends_on("a"),
        Task::new("c", "agent", "p"),
    ]);
    assert_eq!(graph.ready_ids(&done(&[])), vec!["a", "c"]);
}

#[test]
fn test_ready_ids_advances_with_completions() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p"),
        Task::new("b", "agent", "p").depends_on("a"),
        Task::new("c", "agent", "p").depends_on("a"),
        Task::new("d", "agent", "p").depends_on("b").depends_on("c"),
    ]);
    assert_eq!(graph.ready_ids(&done(&["a"])), vec!["b", "c"]);
    assert_eq!(graph.ready_ids(&done(&["a", "b"])), vec!["c"]);
    assert_eq!(graph.ready_ids(&done(&["a", "b", "c"])), vec!["d"]);
    assert!(graph.ready_ids(&done(&["a", "b", "c", "d"])).is_empty());
}

#[test]
fn test_ready_ids_priority_desc_then_insertion_order() {
    let graph = TaskGraph::new(vec![
        Task::new("z_low", "agent", "p").with_priority(1),
        Task::new("x_high", "agent", "p").with_priority(9),
        Task::new("y_high", "agent", "p").with_priority(9),
        Task::new("mid", "agent", "p"),
    ]);
    assert_eq!(
        graph.ready_ids(&done(&[])),
        vec!["x_high", "y_high", "mid", "z_low"]
    );
}

#[test]
fn test_remaining_ids_in_insertion_order() {
    let graph = TaskGraph::new(vec![
        Task::new("a", "agent", "p"),
        Task::new("b", "agent", "p").depends_on("a"),
        Task::new("c", "agent", "p"),
    ]);
    assert_eq!(graph.remaining_ids(&done(&["b"])), vec!["a", "c"]);
    assert!(graph.remaining_ids(&done(&["a", "b", "c"])).is_empty());
}

#[test]
fn test_empty_graph() {
    let graph = TaskGraph::new(vec![]);
    assert!(graph.validate().is_ok());
    assert!(graph.is_empty());
    assert!(graph.ready_ids(&done(&[])).is_empty());
}

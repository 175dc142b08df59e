//! Deferred resolution: GO TO, ALTER, NEXT SENTENCE and out-of-line PERFORM

mod common;

use cobol_cfg::graph::{BlockFlags, BlockId};
use cobol_cfg::node::{NodeTag, Verb};
use cobol_cfg::{CfgConfig, CfgError};
use common::*;
use serde_json::json;

/// `PERFORM P THRU Q` where P jumps to X, outside the range
fn perform_with_escaping_jump() -> serde_json::Value {
    json!({
        "sentences": [[{ "kind": "perform", "procedure": { "name": "P" }, "through": { "name": "Q" } }],
                      [{ "kind": "stop_run" }]],
        "paragraphs": [
            paragraph("P", json!([[go_to("X")]])),
            paragraph("Q", json!([[stmt("add")]])),
            paragraph("X", json!([[stmt("display")]]))
        ]
    })
}

/// START performs P, P performs Q
fn nested_performs() -> serde_json::Value {
    json!({
        "sentences": [[perform("P")], [{ "kind": "stop_run" }]],
        "paragraphs": [
            paragraph("P", json!([[perform("Q")]])),
            paragraph("Q", json!([[stmt("display")]]))
        ]
    })
}

fn member_with(cfg: &cobol_cfg::ControlFlowGraph, members: &[BlockId], tag: NodeTag) -> BlockId {
    members
        .iter()
        .copied()
        .find(|&m| cfg.block(m).instructions.iter().any(|i| i.tag == tag))
        .unwrap_or_else(|| panic!("no member holds {}", tag))
}

fn alter(altered: &str, target: &str) -> serde_json::Value {
    json!({
        "kind": "alter",
        "clauses": [{ "altered": { "name": altered }, "target": { "name": target } }]
    })
}

mod goto {
    use super::*;

    #[test]
    fn test_forward_goto() {
        let program = build(json!({
            "sentences": [[go_to("L")]],
            "paragraphs": [paragraph("L", json!([[stmt("display")]]))]
        }));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoSimple);
        let target = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert!(cfg.block(goto).has_flag(BlockFlags::ENDING));
        assert_eq!(succ(cfg, goto), vec![target.as_u32()]);
        assert!(program.diagnostics.is_empty());
    }

    #[test]
    fn test_backward_goto() {
        let program = build(json!({
            "paragraphs": [
                paragraph("TOP", json!([[stmt("add")]])),
                paragraph("LOOP", json!([[go_to("TOP")]]))
            ]
        }));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoSimple);
        let top = first_with(cfg, NodeTag::Statement(Verb::Add));
        assert_eq!(succ(cfg, goto), vec![top.as_u32()]);
    }

    #[test]
    fn test_conditional_goto_falls_through() {
        let program = build(json!({
            "sentences": [[
                { "kind": "go_to", "targets": [{ "name": "A" }, { "name": "B" }, { "name": "A" }], "depending": true },
                stmt("move")
            ]],
            "paragraphs": [
                paragraph("A", json!([[stmt("add")]])),
                paragraph("B", json!([[stmt("display")]]))
            ]
        }));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoConditional);
        let next = first_with(cfg, NodeTag::Statement(Verb::Move));
        let a = first_with(cfg, NodeTag::Statement(Verb::Add));
        let b = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert!(!cfg.block(goto).has_flag(BlockFlags::ENDING));
        // duplicate targets produce a single edge
        assert_eq!(succ(cfg, goto), vec![next.as_u32(), a.as_u32(), b.as_u32()]);
    }

    #[test]
    fn test_unknown_target_is_skipped() {
        let program = build(json!({
            "sentences": [[
                { "kind": "go_to", "targets": [{ "name": "MISSING" }, { "name": "L" }], "depending": true }
            ]],
            "paragraphs": [paragraph("L", json!([[stmt("display")]]))]
        }));
        assert_eq!(program.diagnostics.len(), 1);
        assert!(matches!(
            &program.diagnostics[0],
            CfgError::UnknownProcedure { name, .. } if name == "MISSING"
        ));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoConditional);
        let target = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert!(succ(cfg, goto).contains(&target.as_u32()));
    }

    #[test]
    fn test_qualified_reference() {
        let division = |target: serde_json::Value| {
            json!({
                "sentences": [[{ "kind": "go_to", "targets": [target] }]],
                "sections": [
                    { "name": "S1", "paragraphs": [paragraph("P", json!([[stmt("add")]]))] },
                    { "name": "S2", "paragraphs": [paragraph("P", json!([[stmt("display")]]))] }
                ]
            })
        };

        let program = build(division(json!({ "name": "p" })));
        assert!(matches!(
            &program.diagnostics[..],
            [CfgError::AmbiguousProcedure { candidates: 2, .. }]
        ));

        let program = build(division(json!({ "name": "P", "qualifiers": ["s2"] })));
        assert!(program.diagnostics.is_empty());
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoSimple);
        let target = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert_eq!(succ(cfg, goto), vec![target.as_u32()]);
    }
}

mod alter {
    use super::*;

    #[test]
    fn test_alter_adds_target() {
        let program = build(json!({
            "sentences": [[alter("L", "M")], [go_to("L")]],
            "paragraphs": [
                paragraph("L", json!([[go_to("K")]])),
                paragraph("K", json!([[stmt("add")]])),
                paragraph("M", json!([[stmt("display")]]))
            ]
        }));
        assert!(program.diagnostics.is_empty());
        let cfg = &program.graph;
        let gotos = blocks_with(cfg, NodeTag::GotoSimple);
        assert_eq!(gotos.len(), 2);
        let altered = gotos[1];
        assert_eq!(cfg.block(altered).tag.as_deref(), Some("L"));
        let k = first_with(cfg, NodeTag::Statement(Verb::Add));
        let m = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert_eq!(succ(cfg, altered), vec![k.as_u32(), m.as_u32()]);
    }

    #[test]
    fn test_repeated_alter_keeps_every_target() {
        let program = build(json!({
            "sentences": [[alter("L", "M")], [alter("L", "N")]],
            "paragraphs": [
                paragraph("L", json!([[go_to("K")]])),
                paragraph("K", json!([[stmt("add")]])),
                paragraph("M", json!([[stmt("display")]])),
                paragraph("N", json!([[stmt("move")]]))
            ]
        }));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoSimple);
        assert_eq!(succ(cfg, goto).len(), 3);
    }

    #[test]
    fn test_malformed_alter() {
        let program = build(json!({
            "sentences": [[alter("L", "M")]],
            "paragraphs": [
                paragraph("L", json!([[stmt("move"), go_to("K")]])),
                paragraph("K", json!([[stmt("add")]])),
                paragraph("M", json!([[stmt("display")]]))
            ]
        }));
        assert!(matches!(
            &program.diagnostics[..],
            [CfgError::MalformedAlter { paragraph, .. }] if paragraph == "L"
        ));
        let cfg = &program.graph;
        let goto = first_with(cfg, NodeTag::GotoSimple);
        let k = first_with(cfg, NodeTag::Statement(Verb::Add));
        assert_eq!(succ(cfg, goto), vec![k.as_u32()]);
    }
}

mod next_sentence {
    use super::*;

    #[test]
    fn test_jumps_out_of_if() {
        let program = build(json!({
            "sentences": [
                [{ "kind": "if", "then": [{ "kind": "next_sentence" }] }, stmt("move")],
                [stmt("display")]
            ]
        }));
        let cfg = &program.graph;
        let jump = first_with(cfg, NodeTag::NextSentence);
        let next = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert!(cfg.block(jump).has_flag(BlockFlags::ENDING));
        assert_eq!(succ(cfg, jump), vec![next.as_u32()]);
    }

    #[test]
    fn test_last_sentence_has_no_target() {
        let program = build(json!({ "sentences": [[{ "kind": "next_sentence" }]] }));
        let cfg = &program.graph;
        let jump = first_with(cfg, NodeTag::NextSentence);
        assert!(succ(cfg, jump).is_empty());
    }
}

mod perform {
    use super::*;

    #[test]
    fn test_call_site_shape() {
        let program = build(json!({
            "sentences": [[stmt("move"), perform("P"), stmt("add")], [{ "kind": "stop_run" }]],
            "paragraphs": [paragraph("P", json!([[stmt("display")]]))]
        }));
        let cfg = &program.graph;
        assert!(cfg.is_compound());
        let before = first_with(cfg, NodeTag::Statement(Verb::Move));
        let call = first_with(cfg, NodeTag::PerformProcedure);
        let after = first_with(cfg, NodeTag::Statement(Verb::Add));
        assert_eq!(succ(cfg, before), vec![call.as_u32()]);
        assert_eq!(succ(cfg, call), vec![after.as_u32()]);

        let group = cfg.group_of(call).unwrap();
        assert_eq!(group.range, "P");
        assert_eq!(group.members.len(), 1);
        let member = cfg.block(group.members[0]);
        assert_eq!(member.instructions[0].tag, NodeTag::Statement(Verb::Display));
        // the range ends with its last block: no edge out of the group
        assert!(cfg.successors(member.id).next().is_none());
        assert_eq!(group.terminal_blocks, vec![member.id]);
    }

    #[test]
    fn test_call_sites_do_not_share_members() {
        let program = build(json!({
            "sentences": [[perform("P")], [perform("P")], [{ "kind": "stop_run" }]],
            "paragraphs": [paragraph("P", json!([[stmt("display")]]))]
        }));
        let cfg = &program.graph;
        let groups = cfg.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 1);
        assert_eq!(groups[1].members.len(), 1);
        assert_ne!(groups[0].members, groups[1].members);

        let original = first_with(cfg, NodeTag::Statement(Verb::Display));
        assert!(!groups[0].members.contains(&original));
        assert!(!groups[1].members.contains(&original));
    }

    #[test]
    fn test_thru_range() {
        let program = build(json!({
            "sentences": [[{ "kind": "perform", "procedure": { "name": "A" }, "through": { "name": "B" } }],
                          [{ "kind": "stop_run" }]],
            "paragraphs": [
                paragraph("A", json!([[stmt("move")]])),
                paragraph("B", json!([[stmt("add")]])),
                paragraph("C", json!([[stmt("display")]]))
            ]
        }));
        assert!(program.diagnostics.is_empty());
        let cfg = &program.graph;
        let group = &cfg.groups()[0];
        assert_eq!(group.range, "A THRU B");
        assert_eq!(group.members.len(), 2);
        let first = group.members[0];
        let last = group.members[1];
        assert_eq!(succ(cfg, first), vec![last.as_u32()]);
        assert!(succ(cfg, last).is_empty());
    }

    #[test]
    fn test_section_range_includes_paragraphs() {
        let program = build(json!({
            "sentences": [[perform("S")], [{ "kind": "stop_run" }]],
            "sections": [
                { "name": "S", "sentences": [[stmt("move")]],
                  "paragraphs": [paragraph("P1", json!([[stmt("add")]]))] },
                { "name": "T", "sentences": [[stmt("display")]] }
            ]
        }));
        let cfg = &program.graph;
        let group = &cfg.groups()[0];
        let tags: Vec<NodeTag> = group
            .members
            .iter()
            .map(|&m| cfg.block(m).instructions[0].tag)
            .collect();
        assert_eq!(
            tags,
            [NodeTag::Statement(Verb::Move), NodeTag::Statement(Verb::Add)]
        );
    }

    #[test]
    fn test_invalid_thru_range() {
        let program = build(json!({
            "sentences": [[{ "kind": "perform", "procedure": { "name": "P" }, "through": { "name": "Q" } }]],
            "paragraphs": [
                paragraph("Q", json!([[stmt("add")]])),
                paragraph("P", json!([[stmt("display")]]))
            ]
        }));
        assert!(matches!(
            &program.diagnostics[..],
            [CfgError::InvalidPerformRange { from, through, .. }] if from == "P" && through == "Q"
        ));
        let cfg = &program.graph;
        assert!(cfg.groups()[0].is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn test_branch_out_of_range() {
        let program = build(json!({
            "sentences": [[{ "kind": "perform", "procedure": { "name": "P" }, "through": { "name": "Q" } }],
                          [{ "kind": "stop_run" }]],
            "paragraphs": [
                paragraph("P", json!([[go_to("X")]])),
                paragraph("Q", json!([[stmt("add")]])),
                paragraph("X", json!([[stmt("display")]]))
            ]
        }));
        assert!(matches!(
            &program.diagnostics[..],
            [CfgError::BranchOutOfRange { tag, .. }] if tag == "P"
        ));
        let cfg = &program.graph;
        let x = first_with(cfg, NodeTag::Statement(Verb::Display));
        let group = &cfg.groups()[0];
        let jump = group.members[0];
        assert_eq!(cfg.block(jump).instructions[0].tag, NodeTag::GotoSimple);
        // the escaping edge is kept
        assert_eq!(succ(cfg, jump), vec![x.as_u32()]);
    }

    #[test]
    fn test_terminals_stay_inside_range() {
        let program = build(perform_with_escaping_jump());
        let cfg = &program.graph;
        assert_terminals_within_groups(cfg);

        let group = &cfg.groups()[0];
        let end = end_block(cfg);
        assert!(!group.terminal_blocks.contains(&end));
        let jump = member_with(cfg, &group.members, NodeTag::GotoSimple);
        let add = member_with(cfg, &group.members, NodeTag::Statement(Verb::Add));
        assert!(group.terminal_blocks.contains(&jump));
        assert!(group.terminal_blocks.contains(&add));
    }

    #[test]
    fn test_nested_group_terminals() {
        let program = build(nested_performs());
        let cfg = &program.graph;
        assert!(cfg.groups().len() >= 2);
        assert_terminals_within_groups(cfg);
        let end = end_block(cfg);
        assert!(cfg.groups().iter().all(|g| !g.terminal_blocks.contains(&end)));
    }

    #[test]
    fn test_recursive_perform() {
        let program = build(json!({
            "sentences": [[perform("P")], [{ "kind": "stop_run" }]],
            "paragraphs": [paragraph("P", json!([[perform("P")]]))]
        }));
        assert!(program
            .diagnostics
            .iter()
            .any(|d| matches!(d, CfgError::RecursivePerform { .. })));
        assert!(program.graph.groups().iter().any(|g| g.recursive));
    }
}

mod graft {
    use super::*;

    #[test]
    fn test_graft_splices_clone() {
        let program = build_division(
            CfgConfig::extended(),
            json!({
                "sentences": [[perform("P")], [{ "kind": "stop_run" }]],
                "paragraphs": [paragraph("P", json!([[stmt("display")]]))]
            }),
        );
        let cfg = &program.graph;
        let call = first_with(cfg, NodeTag::PerformProcedure);
        assert!(cfg.block(call).has_flag(BlockFlags::GROUP_GRAFTED));

        let entry = succ(cfg, call);
        assert_eq!(entry.len(), 1);
        let clone = BlockId(entry[0]);
        assert_eq!(
            cfg.block(clone).instructions[0].tag,
            NodeTag::Statement(Verb::Display)
        );
        assert_eq!(cfg.group_of(call).unwrap().members, vec![clone]);

        // the clone continues where the call site used to
        let stop = first_with(cfg, NodeTag::Ending(cobol_cfg::node::EndingKind::StopRun));
        assert!(reaches(cfg, clone, stop));
    }

    #[test]
    fn test_nested_groups_are_grafted() {
        let program = build_division(
            CfgConfig::extended(),
            json!({
                "sentences": [[perform("P")], [{ "kind": "stop_run" }]],
                "paragraphs": [
                    paragraph("P", json!([[perform("Q")]])),
                    paragraph("Q", json!([[stmt("display")]]))
                ]
            }),
        );
        assert!(program.diagnostics.is_empty());
        let cfg = &program.graph;
        assert_eq!(cfg.groups().len(), 3);

        // the outer call reaches a grafted copy of Q's statement
        let call = first_with(cfg, NodeTag::PerformProcedure);
        let mut found = false;
        cfg.dfs_from(call, |b| {
            found = b.instructions.iter().any(|i| i.tag == NodeTag::Statement(Verb::Display));
            !found
        });
        assert!(found);
    }

    #[test]
    fn test_escaping_jump_does_not_rewire_end() {
        let program = build_division(CfgConfig::extended(), perform_with_escaping_jump());
        let cfg = &program.graph;
        let end = end_block(cfg);
        assert!(succ(cfg, end).is_empty());
        assert_terminals_within_groups(cfg);

        // the grafted jump still leaves the range
        let x = first_with(cfg, NodeTag::Statement(Verb::Display));
        let group = &cfg.groups()[0];
        let jump = member_with(cfg, &group.members, NodeTag::GotoSimple);
        assert_eq!(succ(cfg, jump), vec![x.as_u32()]);
    }

    #[test]
    fn test_nested_grafts_keep_end_a_sink() {
        let program = build_division(CfgConfig::extended(), nested_performs());
        let cfg = &program.graph;
        assert!(succ(cfg, end_block(cfg)).is_empty());
        assert_terminals_within_groups(cfg);
    }

    #[test]
    fn test_depth_limit_leaves_group_empty() {
        let config = CfgConfig {
            max_graft_depth: 1,
            ..CfgConfig::extended()
        };
        let program = build_division(config, nested_performs());
        let cfg = &program.graph;
        assert_eq!(cfg.groups().len(), 3);

        let truncated: Vec<_> = cfg.groups().iter().filter(|g| g.truncated).collect();
        assert_eq!(truncated.len(), 1);
        assert!(truncated[0].is_empty());
        assert!(truncated[0].terminal_blocks.is_empty());

        // no block is a member of two groups
        let mut seen = std::collections::HashSet::new();
        for group in cfg.groups() {
            for member in &group.members {
                assert!(seen.insert(*member), "{:?} shared between groups", member);
            }
        }
    }

    #[test]
    fn test_recursive_group_terminates() {
        let program = build_division(
            CfgConfig::extended(),
            json!({
                "sentences": [[perform("P")], [{ "kind": "stop_run" }]],
                "paragraphs": [paragraph("P", json!([[perform("P")]]))]
            }),
        );
        assert!(!program.diagnostics.is_empty());
        program.graph.validate().unwrap();
    }
}

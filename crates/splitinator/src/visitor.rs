//! Per-container processing. Collects every planned replacement before
//! touching the tree, so a failed name synthesis leaves the container
//! byte-identical in the output.

use std::collections::HashMap;
use std::rc::Rc;

use postcss::result::Result as ProcessResult;
use postcss::{
  as_declaration, as_rule, AtRule, HookResult, Node, NodeAccess, NodeRef, Rule, WarningOptions,
};

use crate::aggregate::{ReplacementDecl, SelectorBuckets};
use crate::fallback::compose_replacement;
use crate::naming::MissingContainerVariable;
use crate::options::Config;

/// State for one processing run, created fresh in `prepare`.
pub(crate) struct RunState {
  pub buckets: SelectorBuckets,
  /// Generated variable name → the original value it stands for, used to
  /// notice collisions across containers.
  pub generated: HashMap<String, String>,
}

impl RunState {
  pub fn new() -> Self {
    RunState {
      buckets: SelectorBuckets::new(),
      generated: HashMap::new(),
    }
  }
}

struct Planned {
  member: String,
  name: String,
  original_value: String,
  replacement: ReplacementDecl,
  flat: Option<NodeRef>,
}

pub(crate) fn process_container(
  at_rule: &AtRule,
  config: &Config,
  state: &mut RunState,
  result: &mut ProcessResult,
) -> HookResult {
  if at_rule.name() != "container" {
    return Ok(());
  }
  let params = at_rule.params();
  if params.is_empty() {
    return Ok(());
  }
  let class_selector = match (config.class_namer)(&params) {
    Some(selector) => selector,
    None => return Ok(()),
  };

  let mut planned: Vec<Planned> = Vec::new();
  let mut processed: Vec<NodeRef> = Vec::new();
  let mut owners: Vec<NodeRef> = Vec::new();
  let mut failure: Option<MissingContainerVariable> = None;

  at_rule.walk_rules(|rule_node, _| {
    let rule = match as_rule(&rule_node) {
      Some(rule) => rule,
      None => return true,
    };
    let selector = rule.selector();
    let members: Vec<String> = postcss::list::comma(&selector)
      .into_iter()
      .filter(|member| !member.is_empty())
      .collect();
    if members.is_empty() {
      return true;
    }

    let mut rule_processed = false;
    let completed = rule.walk_decls(|decl_node, _| {
      // Declarations of nested rules belong to those rules' own visits.
      let owned_here = Node::parent_ref(&decl_node)
        .map(|parent| Rc::ptr_eq(&parent, &rule_node))
        .unwrap_or(false);
      if !owned_here {
        return true;
      }
      let decl = match as_declaration(&decl_node) {
        Some(decl) => decl,
        None => return true,
      };
      let prop = decl.prop();
      if !prop.starts_with("--") {
        return true;
      }
      let value = decl.value();

      for member in &members {
        let name = match (config.property_namer)(member, &prop, &params) {
          Ok(name) => name,
          Err(error) => {
            failure = Some(error);
            return false;
          }
        };

        let mut raws = decl_node.borrow().raws.clone();
        raws.set("before", "\n  ");
        let replacement = ReplacementDecl {
          prop: prop.clone(),
          value: compose_replacement(&value, &name),
          important: decl.important(),
          raws,
        };
        let flat = if config.no_flat_variables {
          None
        } else {
          let flat_name = name.clone();
          Some(decl.clone_with(|clone| {
            if let Some(flat) = as_declaration(clone) {
              flat.set_prop(flat_name);
            }
            clone.borrow_mut().raws.set("before", "\n  ");
          }))
        };
        planned.push(Planned {
          member: member.clone(),
          name,
          original_value: value.clone(),
          replacement,
          flat,
        });
      }

      rule_processed = true;
      processed.push(decl_node.clone());
      true
    });

    if rule_processed {
      owners.push(rule_node.clone());
    }
    completed
  });

  if let Some(error) = failure {
    at_rule.warn(result, error.to_string(), WarningOptions::new());
    return Ok(());
  }

  let synthetic = Rule::new(class_selector);
  synthetic.borrow_mut().source = at_rule.borrow().source.clone();

  for plan in &planned {
    if let Some(flat) = &plan.flat {
      synthetic.append(flat.clone());
    }
    match state.generated.get(&plan.name) {
      Some(previous) if previous != &plan.original_value => {
        result.warn(
          format!(
            "generated variable {} for selector \"{}\" already stands for \"{}\"; \
             now also derived for \"{}\"",
            plan.name, plan.member, previous, plan.original_value
          ),
          WarningOptions::new().with_node(at_rule.node().clone()),
        );
      }
      _ => {
        state
          .generated
          .insert(plan.name.clone(), plan.original_value.clone());
      }
    }
    state.buckets.record(&plan.member, plan.replacement.clone());
  }

  for decl in &processed {
    Node::remove_self(decl);
  }
  for owner in &owners {
    if owner.borrow().nodes.is_empty() {
      Node::remove_self(owner);
    }
  }

  Node::insert_after(at_rule.node(), std::iter::once(synthetic.node().clone()));
  at_rule.remove();
  Ok(())
}

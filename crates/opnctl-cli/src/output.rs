use opnctl_planner::{ChangeOp, Plan};

/// Render a plan's waves as human-readable text, mirroring `terraform plan`'s
/// `+`/`~`/`-` convention.
pub fn render_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return "No changes. Deployment is up to date.".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!("Plan {} (wave count: {})\n", plan.id, plan.waves.len()));
    for wave in &plan.waves {
        out.push_str(&format!("\nWave {} (~{}s):\n", wave.index, wave.estimated_seconds));
        for change in &wave.changes {
            let sign = match change.op {
                ChangeOp::Create => "+",
                ChangeOp::Update => "~",
                ChangeOp::Delete => "-",
                ChangeOp::Replace => "±",
            };
            out.push_str(&format!("  {} {} ({})\n", sign, change.resource_id, change.reason));
        }
    }
    if !plan.risks.is_empty() {
        out.push_str("\nRisks:\n");
        for risk in &plan.risks {
            out.push_str(&format!("  [{:?}] {}: {}\n", risk.severity, risk.resource_id, risk.message));
        }
    }
    out
}

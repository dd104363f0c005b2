//! Fixed monthly cost table for newly created resources.

/// Terraform resource types.
const TF_COSTS: &[(&str, f64)] = &[
    ("aws_instance", 50.0),
    ("aws_db_instance", 100.0),
    ("aws_elasticache_cluster", 75.0),
    ("aws_eks_cluster", 150.0),
    ("aws_lb", 25.0),
    ("aws_alb", 25.0),
    ("aws_nat_gateway", 45.0),
];

/// CloudFormation resource types.
const CF_COSTS: &[(&str, f64)] = &[
    ("AWS::EC2::Instance", 50.0),
    ("AWS::RDS::DBInstance", 100.0),
    ("AWS::ElastiCache::CacheCluster", 75.0),
    ("AWS::EKS::Cluster", 150.0),
    ("AWS::ElasticLoadBalancingV2::LoadBalancer", 25.0),
    ("AWS::EC2::NatGateway", 45.0),
];

/// Estimated $/month for one created resource; unknown types cost nothing.
pub fn monthly_cost(resource_type: &str) -> f64 {
    for (name, cost) in TF_COSTS.iter().chain(CF_COSTS) {
        if resource_type.eq_ignore_ascii_case(name) {
            return *cost;
        }
    }
    0.0
}

pub fn cost_token(total: f64) -> String {
    format!("COST_INCREASE: Estimated ${}/month", total.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_have_costs_unknown_are_free() {
        assert_eq!(monthly_cost("aws_db_instance"), 100.0);
        assert_eq!(monthly_cost("AWS::EKS::Cluster"), 150.0);
        assert_eq!(monthly_cost("aws_s3_bucket"), 0.0);
    }

    #[test]
    fn token_renders_whole_dollars() {
        assert_eq!(cost_token(150.0), "COST_INCREASE: Estimated $150/month");
    }
}

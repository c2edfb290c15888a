//! Static mock collections backing the console pages and the wizards'
//! option providers.

use wizard_spec::{FieldStore, OptionItem, Upstream, WizardDefinitionBuilder};

pub struct Vpc {
    pub id: &'static str,
    pub name: &'static str,
    pub cidr: &'static str,
    pub region: &'static str,
}

pub struct Subnet {
    pub id: &'static str,
    pub name: &'static str,
    pub vpc_id: &'static str,
    pub az: &'static str,
    pub cidr: &'static str,
}

pub struct SecurityGroup {
    pub id: &'static str,
    pub name: &'static str,
    pub vpc_id: &'static str,
}

pub struct Image {
    pub id: &'static str,
    pub name: &'static str,
    pub arch: &'static str,
}

pub struct InstanceType {
    pub id: &'static str,
    pub arch: &'static str,
    pub vcpus: u32,
    pub memory_gib: u32,
}

pub const VPCS: &[Vpc] = &[
    Vpc { id: "vpc-prod", name: "production", cidr: "10.0.0.0/16", region: "eu-central-1" },
    Vpc { id: "vpc-staging", name: "staging", cidr: "10.1.0.0/16", region: "eu-central-1" },
    Vpc { id: "vpc-dev", name: "development", cidr: "10.2.0.0/16", region: "eu-west-1" },
];

pub const SUBNETS: &[Subnet] = &[
    Subnet { id: "subnet-prod-a", name: "prod-private-a", vpc_id: "vpc-prod", az: "eu-central-1a", cidr: "10.0.1.0/24" },
    Subnet { id: "subnet-prod-b", name: "prod-private-b", vpc_id: "vpc-prod", az: "eu-central-1b", cidr: "10.0.2.0/24" },
    Subnet { id: "subnet-prod-c", name: "prod-public-a", vpc_id: "vpc-prod", az: "eu-central-1a", cidr: "10.0.3.0/24" },
    Subnet { id: "subnet-stg-a", name: "staging-a", vpc_id: "vpc-staging", az: "eu-central-1a", cidr: "10.1.1.0/24" },
    Subnet { id: "subnet-stg-b", name: "staging-b", vpc_id: "vpc-staging", az: "eu-central-1b", cidr: "10.1.2.0/24" },
    Subnet { id: "subnet-dev-a", name: "dev-a", vpc_id: "vpc-dev", az: "eu-west-1a", cidr: "10.2.1.0/24" },
];

pub const SECURITY_GROUPS: &[SecurityGroup] = &[
    SecurityGroup { id: "sg-prod-default", name: "default", vpc_id: "vpc-prod" },
    SecurityGroup { id: "sg-prod-web", name: "web", vpc_id: "vpc-prod" },
    SecurityGroup { id: "sg-prod-db", name: "database", vpc_id: "vpc-prod" },
    SecurityGroup { id: "sg-stg-default", name: "default", vpc_id: "vpc-staging" },
    SecurityGroup { id: "sg-stg-web", name: "web", vpc_id: "vpc-staging" },
    SecurityGroup { id: "sg-dev-default", name: "default", vpc_id: "vpc-dev" },
];

pub const IMAGES: &[Image] = &[
    Image { id: "img-ubuntu-2404", name: "Ubuntu 24.04 LTS", arch: "x86_64" },
    Image { id: "img-ubuntu-2404-arm", name: "Ubuntu 24.04 LTS (arm64)", arch: "arm64" },
    Image { id: "img-debian-12", name: "Debian 12", arch: "x86_64" },
    Image { id: "img-windows-2022", name: "Windows Server 2022", arch: "x86_64" },
];

pub const INSTANCE_TYPES: &[InstanceType] = &[
    InstanceType { id: "t3.micro", arch: "x86_64", vcpus: 2, memory_gib: 1 },
    InstanceType { id: "t3.large", arch: "x86_64", vcpus: 2, memory_gib: 8 },
    InstanceType { id: "m6i.xlarge", arch: "x86_64", vcpus: 4, memory_gib: 16 },
    InstanceType { id: "t4g.small", arch: "arm64", vcpus: 2, memory_gib: 2 },
    InstanceType { id: "m7g.large", arch: "arm64", vcpus: 2, memory_gib: 8 },
];

pub const REGIONS: &[(&str, &str)] = &[
    ("eu-central-1", "Europe (Frankfurt)"),
    ("eu-west-1", "Europe (Ireland)"),
    ("us-east-1", "US East (N. Virginia)"),
];

pub const CLUSTER_VERSIONS: &[&str] = &["1.29", "1.30", "1.31"];

pub const IDENTITY_PROVIDER_TYPES: &[(&str, &str)] = &[
    ("oidc", "OpenID Connect"),
    ("saml", "SAML 2.0"),
    ("ldap", "LDAP"),
];

/// Bucket names already taken in the mock account.
pub const EXISTING_BUCKETS: &[&str] = &["logs", "backups", "static-assets"];

fn vpcs(_: &Upstream) -> Vec<OptionItem> {
    VPCS.iter()
        .map(|vpc| {
            OptionItem::new(vpc.id, format!("{} ({})", vpc.name, vpc.cidr))
                .with_meta("cidr", vpc.cidr)
                .with_meta("region", vpc.region)
        })
        .collect()
}

fn subnets(upstream: &Upstream) -> Vec<OptionItem> {
    let Some(vpc) = upstream.get_str("vpc") else {
        return Vec::new();
    };
    SUBNETS
        .iter()
        .filter(|subnet| subnet.vpc_id == vpc)
        .map(|subnet| {
            OptionItem::new(subnet.id, format!("{} {}", subnet.name, subnet.cidr))
                .with_meta("vpc_id", subnet.vpc_id)
                .with_meta("az", subnet.az)
                .with_meta("cidr", subnet.cidr)
        })
        .collect()
}

fn security_groups(upstream: &Upstream) -> Vec<OptionItem> {
    let Some(vpc) = upstream.get_str("vpc") else {
        return Vec::new();
    };
    SECURITY_GROUPS
        .iter()
        .filter(|group| group.vpc_id == vpc)
        .map(|group| OptionItem::new(group.id, group.name).with_meta("vpc_id", group.vpc_id))
        .collect()
}

fn images(_: &Upstream) -> Vec<OptionItem> {
    IMAGES
        .iter()
        .map(|image| OptionItem::new(image.id, image.name).with_meta("arch", image.arch))
        .collect()
}

// Restricted to the architecture of the selected image, if any.
fn instance_types(upstream: &Upstream) -> Vec<OptionItem> {
    let arch = upstream
        .get_str("image")
        .and_then(|id| IMAGES.iter().find(|image| image.id == id))
        .map(|image| image.arch);
    INSTANCE_TYPES
        .iter()
        .filter(|kind| arch.is_none_or(|arch| kind.arch == arch))
        .map(|kind| {
            OptionItem::new(
                kind.id,
                format!("{} ({} vCPU, {} GiB)", kind.id, kind.vcpus, kind.memory_gib),
            )
            .with_meta("arch", kind.arch)
        })
        .collect()
}

fn pairs(entries: &[(&str, &str)]) -> Vec<OptionItem> {
    entries
        .iter()
        .map(|(id, label)| OptionItem::new(*id, *label))
        .collect()
}

fn bucket_name_available(store: &FieldStore) -> Option<String> {
    let name = store.get_str("name")?;
    EXISTING_BUCKETS
        .contains(&name)
        .then(|| format!("a bucket named '{name}' already exists"))
}

fn vpc_cidr_available(store: &FieldStore) -> Option<String> {
    let cidr = store.get_str("cidr")?;
    VPCS.iter()
        .find(|vpc| vpc.cidr == cidr)
        .map(|vpc| format!("{cidr} is already used by {}", vpc.name))
}

/// Registers every catalog-backed option provider and step check.
pub fn register(builder: WizardDefinitionBuilder) -> WizardDefinitionBuilder {
    builder
        .option_fn("vpcs", vpcs)
        .option_fn("subnets", subnets)
        .option_fn("security_groups", security_groups)
        .option_fn("images", images)
        .option_fn("instance_types", instance_types)
        .option_fn("regions", |_| pairs(REGIONS))
        .option_fn("cluster_versions", |_| {
            CLUSTER_VERSIONS
                .iter()
                .map(|version| OptionItem::new(*version, format!("Kubernetes {version}")))
                .collect()
        })
        .option_fn("identity_provider_types", |_| pairs(IDENTITY_PROVIDER_TYPES))
        .check_fn("bucket_name_available", bucket_name_available)
        .check_fn("vpc_cidr_available", vpc_cidr_available)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vpc(id: &str) -> Upstream {
        Upstream::from_pairs([("vpc", json!(id))])
    }

    #[test]
    fn subnets_follow_the_selected_vpc() {
        let items = subnets(&vpc("vpc-staging"));
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.meta("vpc_id") == Some("vpc-staging")));
        assert!(subnets(&Upstream::default()).is_empty());
    }

    #[test]
    fn instance_types_match_image_architecture() {
        let upstream = Upstream::from_pairs([("image", json!("img-ubuntu-2404-arm"))]);
        let ids: Vec<String> = instance_types(&upstream)
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["t4g.small", "m7g.large"]);
        assert_eq!(instance_types(&Upstream::default()).len(), INSTANCE_TYPES.len());
    }

    #[test]
    fn taken_bucket_names_are_reported() {
        let mut store = FieldStore::new();
        store.set("name", json!("logs"));
        assert!(bucket_name_available(&store).is_some());
        store.set("name", json!("fresh-bucket"));
        assert!(bucket_name_available(&store).is_none());
    }
}

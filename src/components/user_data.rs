//! Bootstrap script passed to the compute instance as user data.
//!
//! The instance installs the provisioning CLI and points its state backend
//! at the shared bucket. The script is opaque to the rest of the crate.

const TEMPLATE: &str = r#"#!/bin/bash
set -euo pipefail

BUCKET_NAME="{{bucket_name}}"
BUCKET_REGION="{{bucket_region}}"
INSTANCE_REGION="{{instance_region}}"

dnf install -y git jq tar gzip
curl -fsSL https://get.pulumi.com | sh -s -- --install-root /usr/local

cat > /etc/profile.d/region-mesh.sh <<EOF
export AWS_REGION=${INSTANCE_REGION}
export PULUMI_BACKEND_URL="s3://${BUCKET_NAME}?region=${BUCKET_REGION}"
EOF

echo "region-mesh bootstrap done in ${INSTANCE_REGION}" > /var/log/region-mesh-bootstrap.log
"#;

/// Values embedded in the bootstrap script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapParams<'a> {
    pub bucket_name: &'a str,
    pub bucket_region: &'a str,
    pub instance_region: &'a str,
}

/// Render the bootstrap script.
pub fn render_bootstrap(params: &BootstrapParams) -> String {
    TEMPLATE
        .replace("{{bucket_name}}", params.bucket_name)
        .replace("{{bucket_region}}", params.bucket_region)
        .replace("{{instance_region}}", params.instance_region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_embeds_all_values() {
        let script = render_bootstrap(&BootstrapParams {
            bucket_name: "mesh-state",
            bucket_region: "us-east-1",
            instance_region: "eu-west-3",
        });
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("BUCKET_NAME=\"mesh-state\""));
        assert!(script.contains("BUCKET_REGION=\"us-east-1\""));
        assert!(script.contains("INSTANCE_REGION=\"eu-west-3\""));
        assert!(!script.contains("{{"));
    }
}

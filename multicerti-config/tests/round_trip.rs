use multicerti_config::{derive_template, parse, ConfigTree, Node, SlotValues, Template};

const DEBIAN_NGINX_CONF: &str = r#"
user www-data;
worker_processes auto;
pid /run/nginx.pid;
include /etc/nginx/modules-enabled/*.conf;

events {
	worker_connections 768;
	# multi_accept on;
}

http {
	##
	# Basic Settings
	##

	sendfile on;
	tcp_nopush on;
	types_hash_max_size 2048;
	# server_tokens off;

	include /etc/nginx/mime.types;
	default_type application/octet-stream;

	ssl_protocols TLSv1 TLSv1.1 TLSv1.2 TLSv1.3; # Dropping SSLv3, ref: POODLE
	ssl_prefer_server_ciphers on;

	log_format  main  '$remote_addr - $remote_user [$time_local] "$request" '
	                  '$status $body_bytes_sent "$http_referer"';
	access_log /var/log/nginx/access.log main;
	error_log /var/log/nginx/error.log;

	gzip on;
	map $http_upgrade $connection_upgrade {
		default upgrade;
		''      close;
	}

	include /etc/nginx/conf.d/*.conf;
	include /etc/nginx/sites-enabled/*;
}

#mail {
#	server {
#		listen     localhost:110;
#	}
#}
"#;

const FREEBSD_NGINX_CONF: &str = r#"
worker_processes  1;
events {
    worker_connections  1024;
}
http {
    include       mime.types;
    default_type  application/octet-stream;
    sendfile        on;
    keepalive_timeout  65;
    server {
        listen       80;
        server_name  localhost;
        location / {
            root   /usr/local/www/nginx;
            index  index.html index.htm;
        }
        error_page   500 502 503 504  /50x.html;
        location = /50x.html {
            root   /usr/local/www/nginx-dist;
        }
        location ~ \.php$ {
            proxy_pass   http://127.0.0.1;
        }
    }
}
"#;

fn count_nodes(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Directive(_) => 1,
            Node::Block(b) => 1 + count_nodes(&b.children),
        })
        .sum()
}

#[test]
fn test_serialize_then_parse_is_structurally_equal() {
    for source in [DEBIAN_NGINX_CONF, FREEBSD_NGINX_CONF] {
        let first = parse(source).unwrap();
        let text = first.to_string();
        let second = parse(&text).unwrap();
        assert_eq!(first, second);
        // Normalized output is a fixed point
        assert_eq!(second.to_string(), text);
    }
}

#[test]
fn test_comments_are_dropped() {
    let tree = parse(DEBIAN_NGINX_CONF).unwrap();
    let text = tree.to_string();
    assert!(!text.contains("multi_accept"));
    assert!(!text.contains("POODLE"));
    assert!(!text.contains("mail"));
    // map block with quoted empty key survives
    assert!(text.contains("'' close;"));
    assert_eq!(count_nodes(&tree.nodes), 23);
}

#[test]
fn test_multiline_quoted_values_survive() {
    let tree = parse(DEBIAN_NGINX_CONF).unwrap();
    let http = tree.block("http").unwrap();
    let log_format = http.directives("log_format").next().unwrap();
    assert_eq!(log_format.args.len(), 3);
    assert_eq!(
        log_format.args[2],
        r#"'$status $body_bytes_sent "$http_referer"'"#
    );
}

#[test]
fn test_derived_template_renders_into_valid_config() {
    let derived = derive_template(DEBIAN_NGINX_CONF).unwrap().unwrap();
    assert!(!derived.contains("sites-enabled"));
    assert!(derived.contains("include /etc/nginx/conf.d/*.conf;"));

    let template = Template::parse(&derived).unwrap();
    let filled = template.fill(&SlotValues {
        upstreams: "upstream frontends1 { server 127.0.0.1:8080; }".to_string(),
        servers: "server { listen 80; server_name example.com; }".to_string(),
    });
    let tree: ConfigTree = parse(&filled).unwrap();
    let http = tree.block("http").unwrap();
    assert_eq!(http.blocks("upstream").count(), 1);
    assert_eq!(http.blocks("server").count(), 2);
    assert_eq!(
        http.directives("server_tokens").next().unwrap().args,
        vec!["off"]
    );
}

#[test]
fn test_derive_supersedes_existing_servers() {
    let derived = derive_template(FREEBSD_NGINX_CONF).unwrap().unwrap();
    let template = Template::parse(&derived).unwrap();
    let tree = parse(&template.fill(&SlotValues::default())).unwrap();
    let http = tree.block("http").unwrap();

    let servers: Vec<_> = http.blocks("server").collect();
    assert_eq!(servers.len(), 1);
    assert_eq!(
        servers[0].directives("listen").next().unwrap().args,
        vec!["80", "default_server"]
    );
    assert_eq!(http.directives("keepalive_timeout").count(), 1);
}

#[test]
fn test_quotes_inside_words_survive() {
    let source = "http {\n    add_header X-Note it's;\n    set $a foo\"bar\";\n}\n";
    let tree = parse(source).unwrap();
    assert_eq!(tree.to_string(), source);

    let http = tree.block("http").unwrap();
    assert_eq!(http.directives("set").next().unwrap().args, vec!["$a", "foo\"bar\""]);

    let derived = derive_template(source).unwrap().unwrap();
    assert!(derived.contains("add_header X-Note it's;"));
    assert!(derived.contains("set $a foo\"bar\";"));
}

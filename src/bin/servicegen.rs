use keystone_auth_operator::cluster::ServiceDescriptor;

fn main() {
    let mut args = std::env::args().skip(1);
    let app_name = args.next().unwrap_or_else(|| "keystone-auth".into());
    let namespace = args.next().unwrap_or_else(|| "default".into());

    print!(
        "{}",
        serde_yaml::to_string(&ServiceDescriptor::for_app(&app_name, &namespace).to_service())
            .unwrap()
    )
}
